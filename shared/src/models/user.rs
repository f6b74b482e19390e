//! Platform users (buyers, suppliers, admins)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Buyer,
    Supplier,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buyer => "buyer",
            Self::Supplier => "supplier",
            Self::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buyer" => Ok(Self::Buyer),
            "supplier" => Ok(Self::Supplier),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown user role: {other}")),
        }
    }
}

/// User profile row
///
/// `user_id` is the identity provider's subject; `public_id` is the
/// `BUY...`/`SUP...` handle shown to other parties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub public_id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub company_name: Option<String>,
    pub phone: Option<String>,
    pub wechat: Option<String>,
    pub country: Option<String>,
    pub role: UserRole,
    pub created_at: i64,
}

impl UserProfile {
    /// Name to greet the user with in emails
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .or(self.company_name.as_deref())
            .unwrap_or(&self.email)
    }
}
