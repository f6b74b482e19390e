//! Data models
//!
//! Shared between regravity-cloud and the web client (via API).
//! Row structs live in the service's `db` modules; these are the domain shapes.
//! Timestamps are Unix milliseconds, money is `Decimal` at 2 places.

pub mod order;
pub mod order_request;
pub mod service;
pub mod service_order;
pub mod user;
pub mod verification;

// Re-exports
pub use order::*;
pub use order_request::*;
pub use service::*;
pub use service_order::*;
pub use user::*;
pub use verification::*;
