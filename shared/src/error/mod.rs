//! Unified error system for Regravity
//!
//! This module provides:
//! - [`ErrorCode`]: Standardized error codes for all error types
//! - [`ErrorCategory`]: Classification of errors by domain
//! - [`AppError`]: Rich error type with codes, messages, and details,
//!   rendered by axum as `{ code, message, details }`
//!
//! # Error Code Ranges
//!
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 3xxx: Verification errors
//! - 4xxx: Order errors
//! - 5xxx: Delivery (email) errors
//! - 6xxx: Storage errors
//! - 9xxx: System errors
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode};
//!
//! let err = AppError::new(ErrorCode::OrderNotFound);
//! assert_eq!(err.http_status().as_u16(), 404);
//!
//! let err = AppError::validation("Reason is required")
//!     .with_detail("field", "reason");
//! assert_eq!(err.code.code(), 2);
//! ```

mod category;
mod codes;
mod http;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::AppError;
