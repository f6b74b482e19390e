//! Shared types for Regravity
//!
//! Domain models, identifier generation and the unified error system used by
//! the cloud service and its tests.

pub mod error;
pub mod models;
pub mod util;

pub use error::{AppError, ErrorCode};
