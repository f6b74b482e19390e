//! Trade order model and status table

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::service::SelectedServices;

/// Order status
///
/// Every per-status fact (label, badge color, allowed transitions, whether a
/// buyer may still ask for changes) lives in [`OrderStatus::meta`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingReview,
    PendingSupplierRegistration,
    Approved,
    PaymentConfirmed,
    InProgress,
    Completed,
    Rejected,
    Disputed,
}

/// Display and transition metadata for one status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusMeta {
    pub label: &'static str,
    /// Badge color token used by the web client
    pub color: &'static str,
    pub next: &'static [OrderStatus],
    pub allows_change_request: bool,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::PendingReview,
        OrderStatus::PendingSupplierRegistration,
        OrderStatus::Approved,
        OrderStatus::PaymentConfirmed,
        OrderStatus::InProgress,
        OrderStatus::Completed,
        OrderStatus::Rejected,
        OrderStatus::Disputed,
    ];

    pub fn meta(&self) -> StatusMeta {
        use OrderStatus::*;
        match self {
            PendingReview => StatusMeta {
                label: "Pending Review",
                color: "yellow",
                next: &[Approved, Rejected, Disputed],
                allows_change_request: true,
            },
            PendingSupplierRegistration => StatusMeta {
                label: "Awaiting Supplier Registration",
                color: "orange",
                next: &[PendingReview, Approved, Rejected, Disputed],
                allows_change_request: true,
            },
            Approved => StatusMeta {
                label: "Approved",
                color: "blue",
                next: &[PaymentConfirmed, Rejected, Disputed],
                allows_change_request: true,
            },
            PaymentConfirmed => StatusMeta {
                label: "Payment Confirmed",
                color: "indigo",
                next: &[InProgress, Rejected, Disputed],
                allows_change_request: false,
            },
            InProgress => StatusMeta {
                label: "In Progress",
                color: "purple",
                next: &[Completed, Rejected, Disputed],
                allows_change_request: false,
            },
            Completed => StatusMeta {
                label: "Completed",
                color: "green",
                next: &[],
                allows_change_request: false,
            },
            Rejected => StatusMeta {
                label: "Rejected",
                color: "red",
                next: &[],
                allows_change_request: false,
            },
            Disputed => StatusMeta {
                label: "Disputed",
                color: "gray",
                next: &[],
                allows_change_request: false,
            },
        }
    }

    /// Whether a buyer may still open an edit/cancel request
    pub fn allows_change_request(&self) -> bool {
        self.meta().allows_change_request
    }

    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        self.meta().next.contains(&to)
    }

    pub fn is_terminal(&self) -> bool {
        self.meta().next.is_empty()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingReview => "pending_review",
            Self::PendingSupplierRegistration => "pending_supplier_registration",
            Self::Approved => "approved",
            Self::PaymentConfirmed => "payment_confirmed",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Disputed => "disputed",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown order status: {s}"))
    }
}

/// Trade order
///
/// Buyer and supplier fields are a snapshot of the terms at creation time.
/// They are never re-synced from the user records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Storage row id (assigned by the repository)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// External identifier, `ORD` + 10 chars
    pub order_id: String,
    pub buyer_id: String,
    pub buyer_email: String,
    pub buyer_company: Option<String>,
    pub supplier_id: Option<String>,
    pub supplier_name: String,
    pub supplier_email: Option<String>,
    pub supplier_phone: Option<String>,
    pub supplier_wechat: Option<String>,
    pub product_description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub deal_amount: Decimal,
    pub supplier_bank_account: Option<String>,
    pub selected_services: SelectedServices,
    #[serde(with = "rust_decimal::serde::float")]
    pub service_cost: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    /// `total_amount == deal_amount + service_cost`
    pub fn totals_consistent(&self) -> bool {
        self.total_amount == (self.deal_amount + self.service_cost).round_dp(2)
    }

    pub fn has_new_supplier(&self) -> bool {
        self.status == OrderStatus::PendingSupplierRegistration
    }
}

/// How the buyer names the supplier on a new order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplierType {
    /// Supplier already registered on the platform
    Existing,
    /// Supplier invited by email, registers later
    New,
}

/// Create order payload
///
/// Supplier fields are validated against `supplier_type`: `existing` needs
/// `supplier_id`, `new` needs `supplier_name` and `supplier_email`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreate {
    pub supplier_type: SupplierType,
    pub supplier_id: Option<String>,
    pub supplier_name: Option<String>,
    pub supplier_email: Option<String>,
    pub supplier_phone: Option<String>,
    pub supplier_wechat: Option<String>,
    pub product_description: String,
    pub deal_amount: Decimal,
    pub supplier_bank_account: Option<String>,
    #[serde(default)]
    pub selected_services: SelectedServices,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_request_window() {
        let allowed: Vec<_> = OrderStatus::ALL
            .into_iter()
            .filter(|s| s.allows_change_request())
            .collect();
        assert_eq!(
            allowed,
            vec![
                OrderStatus::PendingReview,
                OrderStatus::PendingSupplierRegistration,
                OrderStatus::Approved,
            ]
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(OrderStatus::Disputed.is_terminal());
        assert!(!OrderStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_side_exits_reachable_from_every_non_terminal() {
        for status in OrderStatus::ALL.into_iter().filter(|s| !s.is_terminal()) {
            assert!(status.can_transition_to(OrderStatus::Rejected), "{status}");
            assert!(status.can_transition_to(OrderStatus::Disputed), "{status}");
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        assert!(OrderStatus::PendingReview.can_transition_to(OrderStatus::Approved));
        assert!(OrderStatus::Approved.can_transition_to(OrderStatus::PaymentConfirmed));
        assert!(OrderStatus::PaymentConfirmed.can_transition_to(OrderStatus::InProgress));
        assert!(OrderStatus::InProgress.can_transition_to(OrderStatus::Completed));
        assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::InProgress));
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert!("cancelled".parse::<OrderStatus>().is_err());
    }
}
