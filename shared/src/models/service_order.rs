//! Standalone purchase of a single add-on service

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::order::OrderStatus;
use super::service::ServiceId;

/// Free-form per-type details (keys listed by [`ServiceId::required_details`])
pub type ServiceDetails = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceOrder {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// `SRV` + 10 chars
    pub order_id: String,
    pub buyer_id: String,
    pub buyer_email: String,
    pub buyer_company: Option<String>,
    pub service_type: ServiceId,
    pub service_details: ServiceDetails,
    #[serde(with = "rust_decimal::serde::float")]
    pub service_cost: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceOrderCreate {
    pub service_type: ServiceId,
    #[serde(default)]
    pub service_details: ServiceDetails,
}

impl ServiceOrderCreate {
    /// Required detail keys that are absent or blank
    pub fn missing_details(&self) -> Vec<&'static str> {
        self.service_type
            .required_details()
            .iter()
            .copied()
            .filter(|key| {
                self.service_details
                    .get(*key)
                    .is_none_or(|v| v.trim().is_empty())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_details_for_inspection() {
        let mut details = ServiceDetails::new();
        details.insert("supplier_address".into(), "12 Dock Rd".into());
        details.insert("contact_person".into(), "  ".into());
        let input = ServiceOrderCreate {
            service_type: ServiceId::Inspection,
            service_details: details,
        };
        assert_eq!(
            input.missing_details(),
            vec!["contact_person", "contact_phone", "inspection_date"]
        );
    }

    #[test]
    fn test_quote_services_need_requirements() {
        let mut input = ServiceOrderCreate {
            service_type: ServiceId::Shipping,
            service_details: ServiceDetails::new(),
        };
        assert_eq!(input.missing_details(), vec!["requirements"]);
        input
            .service_details
            .insert("requirements".into(), "FOB Shenzhen".into());
        assert!(input.missing_details().is_empty());
    }
}
