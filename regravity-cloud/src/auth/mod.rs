//! Authentication and request throttling middleware

pub mod identity;
pub mod rate_limit;

pub use identity::{Identity, require_admin};
