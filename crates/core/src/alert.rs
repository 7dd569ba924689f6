//! Risk alerts raised when a client metric crosses a configured limit

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    CreditBreach,
    MarginCall,
    Concentration,
    Counterparty,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumString,
    Display,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// A single breach instance.
///
/// Immutable once created except for `acknowledged`, which flips to `true`
/// exactly once. Who acknowledged and when is kept in the audit journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAlert {
    pub id: String,
    pub client_id: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub threshold: Decimal,
    pub current_value: Decimal,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
}

impl RiskAlert {
    pub fn new(
        client_id: impl Into<String>,
        alert_type: AlertType,
        severity: AlertSeverity,
        message: impl Into<String>,
        threshold: Decimal,
        current_value: Decimal,
    ) -> Self {
        Self {
            id: crate::new_id("alert"),
            client_id: client_id.into(),
            alert_type,
            severity,
            message: message.into(),
            threshold,
            current_value,
            timestamp: Utc::now(),
            acknowledged: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_alert_unacknowledged() {
        let a = RiskAlert::new(
            "C1",
            AlertType::CreditBreach,
            AlertSeverity::High,
            "Leverage 12x exceeds 10x",
            dec!(10),
            dec!(12),
        );
        assert!(!a.acknowledged);
        assert_eq!(a.current_value - a.threshold, dec!(2));
        assert!(a.id.starts_with("alert-"));
    }

    #[test]
    fn test_serialized_type_names() {
        let a = RiskAlert::new("C1", AlertType::MarginCall, AlertSeverity::Critical, "m", dec!(0.8), dec!(0.9));
        let json = serde_json::to_string(&a).unwrap();
        assert!(json.contains(r#""type":"margin_call""#));
        assert!(json.contains(r#""severity":"critical""#));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(AlertSeverity::Critical > AlertSeverity::High);
        assert!(AlertSeverity::Low < AlertSeverity::Medium);
    }
}
