//! Risk limits and monitor settings
//!
//! Every field has a serde default so a partial JSON document only
//! overrides what it names.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Leverage (exposure / collateral) above which a breach is raised
    #[serde(default = "default_leverage_limit")]
    pub leverage_limit: Decimal,

    /// Largest single-symbol notional as a fraction of the credit limit
    #[serde(default = "default_concentration_limit")]
    pub concentration_limit: Decimal,

    /// Margin requirement / credit limit above which a margin call is raised
    #[serde(default = "default_margin_call_threshold")]
    pub margin_call_threshold: Decimal,

    /// Unrealized loss that costs the full 10 P&L points
    #[serde(default = "default_pnl_loss_scale")]
    pub pnl_loss_scale: Decimal,

    /// Scores below this are "low risk"
    #[serde(default = "default_low_risk_score")]
    pub low_risk_score: Decimal,

    /// Scores at or above this are "high risk"
    #[serde(default = "default_high_risk_score")]
    pub high_risk_score: Decimal,

    /// Scores above this trigger the CRITICAL recommendation
    #[serde(default = "default_critical_risk_score")]
    pub critical_risk_score: Decimal,

    #[serde(default = "default_monitor_interval_secs")]
    pub monitor_interval_secs: u64,
}

fn default_leverage_limit() -> Decimal {
    Decimal::new(10, 0)
}

fn default_concentration_limit() -> Decimal {
    Decimal::new(25, 2)
}

fn default_margin_call_threshold() -> Decimal {
    Decimal::new(8, 1)
}

fn default_pnl_loss_scale() -> Decimal {
    Decimal::new(100_000, 0)
}

fn default_low_risk_score() -> Decimal {
    Decimal::new(30, 0)
}

fn default_high_risk_score() -> Decimal {
    Decimal::new(70, 0)
}

fn default_critical_risk_score() -> Decimal {
    Decimal::new(80, 0)
}

fn default_monitor_interval_secs() -> u64 {
    30
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            leverage_limit: default_leverage_limit(),
            concentration_limit: default_concentration_limit(),
            margin_call_threshold: default_margin_call_threshold(),
            pnl_loss_scale: default_pnl_loss_scale(),
            low_risk_score: default_low_risk_score(),
            high_risk_score: default_high_risk_score(),
            critical_risk_score: default_critical_risk_score(),
            monitor_interval_secs: default_monitor_interval_secs(),
        }
    }
}

impl RiskConfig {
    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        let config = RiskConfig::default();
        assert_eq!(config.leverage_limit, dec!(10));
        assert_eq!(config.concentration_limit, dec!(0.25));
        assert_eq!(config.margin_call_threshold, dec!(0.8));
        assert_eq!(config.monitor_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_json() {
        let config: RiskConfig = serde_json::from_str(r#"{ "leverage_limit": "5" }"#).unwrap();
        assert_eq!(config.leverage_limit, dec!(5));
        assert_eq!(config.concentration_limit, dec!(0.25));
    }
}
