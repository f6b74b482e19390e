//! Verification purposes

use serde::{Deserialize, Serialize};
use std::fmt;

/// What an email verification code unlocks. Challenges for different
/// purposes are independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationPurpose {
    Signup,
    Login,
}

impl VerificationPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Signup => "signup",
            Self::Login => "login",
        }
    }

    /// Phrase used in email copy ("to complete your sign up")
    pub fn action(&self) -> &'static str {
        match self {
            Self::Signup => "complete your sign up",
            Self::Login => "log in",
        }
    }
}

impl fmt::Display for VerificationPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
