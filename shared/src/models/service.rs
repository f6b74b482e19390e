//! Add-on service catalog

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Add-on service identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceId {
    Verification,
    Inspection,
    Testing,
    Shipping,
    Certificates,
}

/// Service selection on an order: service -> selected
pub type SelectedServices = BTreeMap<ServiceId, bool>;

impl ServiceId {
    pub const ALL: [ServiceId; 5] = [
        ServiceId::Verification,
        ServiceId::Inspection,
        ServiceId::Testing,
        ServiceId::Shipping,
        ServiceId::Certificates,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verification => "verification",
            Self::Inspection => "inspection",
            Self::Testing => "testing",
            Self::Shipping => "shipping",
            Self::Certificates => "certificates",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Verification => "Supplier Verification",
            Self::Inspection => "Factory Inspection",
            Self::Testing => "Product Testing",
            Self::Shipping => "Shipping Coordination",
            Self::Certificates => "Certificates & Compliance",
        }
    }

    /// Fixed price charged at creation time. Zero means "quote later".
    pub fn fixed_cost(&self) -> Decimal {
        match self {
            Self::Verification => Decimal::new(50, 0),
            Self::Inspection => Decimal::new(300, 0),
            Self::Testing | Self::Shipping | Self::Certificates => Decimal::ZERO,
        }
    }

    pub fn is_quoted_later(&self) -> bool {
        self.fixed_cost().is_zero()
    }

    /// Keys a standalone service order must carry in `service_details`
    pub fn required_details(&self) -> &'static [&'static str] {
        match self {
            Self::Verification => &["company_name", "registration_number", "country"],
            Self::Inspection => &[
                "supplier_address",
                "contact_person",
                "contact_phone",
                "inspection_date",
            ],
            Self::Testing | Self::Shipping | Self::Certificates => &["requirements"],
        }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| format!("unknown service: {s}"))
    }
}

/// Sum of fixed costs for every selected service, rounded to cents.
///
/// Quote-later services contribute zero whether or not they are selected.
pub fn service_cost(selected: &SelectedServices) -> Decimal {
    selected
        .iter()
        .filter(|(_, on)| **on)
        .map(|(id, _)| id.fixed_cost())
        .sum::<Decimal>()
        .round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection(pairs: &[(ServiceId, bool)]) -> SelectedServices {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_verification_only() {
        let s = selection(&[(ServiceId::Verification, true), (ServiceId::Inspection, false)]);
        assert_eq!(service_cost(&s), Decimal::new(50, 0));
    }

    #[test]
    fn test_quote_services_contribute_zero() {
        let s = selection(&[
            (ServiceId::Testing, true),
            (ServiceId::Shipping, true),
            (ServiceId::Certificates, true),
        ]);
        assert_eq!(service_cost(&s), Decimal::ZERO);
    }

    #[test]
    fn test_every_subset_sums_fixed_costs() {
        for mask in 0u8..32 {
            let s: SelectedServices = ServiceId::ALL
                .iter()
                .enumerate()
                .map(|(i, id)| (*id, mask & (1 << i) != 0))
                .collect();
            let expected: Decimal = ServiceId::ALL
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, id)| id.fixed_cost())
                .sum();
            assert_eq!(service_cost(&s), expected);
        }
    }

    #[test]
    fn test_parse_and_serde() {
        assert_eq!("inspection".parse::<ServiceId>(), Ok(ServiceId::Inspection));
        assert!("insurance".parse::<ServiceId>().is_err());

        let s: SelectedServices =
            serde_json::from_str(r#"{"verification":true,"shipping":false}"#).unwrap();
        assert_eq!(s.get(&ServiceId::Verification), Some(&true));
        assert_eq!(s.get(&ServiceId::Shipping), Some(&false));
    }
}
