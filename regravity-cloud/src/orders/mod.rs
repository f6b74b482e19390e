//! Order lifecycle: creation, service orders, reads and change requests

pub mod change_request;
pub mod service;

pub use change_request::{ChangeRequestOutcome, StorageTier, can_request_change};
pub use service::OrderService;
