//! Edit/cancel requests raised by a buyer against an order

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Edit,
    Cancel,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Cancel => "cancel",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Edit => "Edit Request",
            Self::Cancel => "Cancellation Request",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "edit" => Ok(Self::Edit),
            "cancel" => Ok(Self::Cancel),
            other => Err(format!("unknown request type: {other}")),
        }
    }
}

/// Request status. Only `pending` is ever written by the buyer side;
/// admins resolve requests out-of-band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown request status: {other}")),
        }
    }
}

/// Change request record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// UUID, generated before insert so every storage tier writes the same id
    pub id: String,
    /// External order id (`ORD...`), not a foreign key
    pub order_id: String,
    pub buyer_id: String,
    pub request_type: RequestType,
    pub reason: String,
    pub details: Option<String>,
    pub status: RequestStatus,
    pub admin_response: Option<String>,
    pub admin_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub resolved_at: Option<i64>,
}

/// Create change request payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequestCreate {
    pub request_type: RequestType,
    #[serde(default)]
    pub reason: String,
    pub details: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_type_parse() {
        assert_eq!("edit".parse::<RequestType>(), Ok(RequestType::Edit));
        assert_eq!("cancel".parse::<RequestType>(), Ok(RequestType::Cancel));
        assert!("delete".parse::<RequestType>().is_err());
    }

    #[test]
    fn test_status_defaults_to_pending() {
        assert_eq!(RequestStatus::default(), RequestStatus::Pending);
        assert!(!RequestStatus::Pending.is_resolved());
        assert!(RequestStatus::Completed.is_resolved());
    }

    #[test]
    fn test_create_payload_missing_reason_is_empty() {
        let payload: OrderRequestCreate =
            serde_json::from_str(r#"{"request_type":"cancel"}"#).unwrap();
        assert_eq!(payload.request_type, RequestType::Cancel);
        assert!(payload.reason.is_empty());
    }
}
