//! Risk scoring
//!
//! Pure functions from (profile, positions) to a 0-100 score. Each
//! component is capped on its own, then the sum is clamped.
//!
//! | component          | ratio                          | points cap |
//! |--------------------|--------------------------------|------------|
//! | concentration      | largest \|notional\| / limit    | 30         |
//! | leverage           | exposure / collateral / limit  | 25         |
//! | margin utilization | margin requirement / limit     | 20         |
//! | credit utilization | used / limit                   | 15         |
//! | unrealized loss    | \|P&L\| / loss scale            | 10         |

use chrono::{DateTime, Utc};
use riskbank_core::{ClientExposure, CreditProfile, RiskTier};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::RiskConfig;
use crate::exposure::ExposureTotals;

const MAX_SCORE: Decimal = Decimal::ONE_HUNDRED;

/// Points contributed by each component
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub concentration: Decimal,
    pub leverage: Decimal,
    pub margin_utilization: Decimal,
    pub credit_utilization: Decimal,
    pub unrealized_loss: Decimal,
}

impl ScoreBreakdown {
    pub fn total(&self) -> Decimal {
        let sum = self.concentration
            + self.leverage
            + self.margin_utilization
            + self.credit_utilization
            + self.unrealized_loss;
        sum.max(Decimal::ZERO).min(MAX_SCORE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub client_id: String,
    pub risk_score: Decimal,
    pub breakdown: ScoreBreakdown,
    pub leverage: Decimal,
    pub max_concentration: Decimal,
    /// Symbol holding the largest position
    pub concentration_symbol: Option<String>,
    pub margin_utilization: Decimal,
    pub unrealized_pnl: Decimal,
    pub total_exposure: Decimal,
    pub credit_utilization: Decimal,
    pub recommendations: Vec<String>,
    /// Tier the score points to. Advisory only; the stored tier changes
    /// through admin overrides.
    pub suggested_tier: RiskTier,
    pub calculated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct RiskScorer {
    config: RiskConfig,
}

impl RiskScorer {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn score(&self, profile: &CreditProfile, positions: &[ClientExposure]) -> RiskSnapshot {
        let totals = ExposureTotals::from_positions(positions);
        let limit = profile.credit_limit;

        let (concentration_symbol, largest) = match totals.largest_position {
            Some((symbol, notional)) => (Some(symbol), notional),
            None => (None, Decimal::ZERO),
        };
        let max_concentration = ratio(largest, limit);
        let leverage = ratio(totals.gross_notional, profile.collateral_value);
        let margin_utilization = ratio(profile.margin_requirement, limit);
        let credit_utilization = ratio(profile.used_credit, limit);

        let breakdown = ScoreBreakdown {
            concentration: points(max_concentration, Decimal::ONE_HUNDRED, Decimal::from(30)),
            leverage: points(
                ratio(leverage, self.config.leverage_limit),
                Decimal::from(25),
                Decimal::from(25),
            ),
            margin_utilization: points(margin_utilization, Decimal::from(20), Decimal::from(20)),
            credit_utilization: points(credit_utilization, Decimal::from(15), Decimal::from(15)),
            unrealized_loss: if totals.unrealized_pnl < Decimal::ZERO {
                points(
                    ratio(totals.unrealized_pnl.abs(), self.config.pnl_loss_scale),
                    Decimal::TEN,
                    Decimal::TEN,
                )
            } else {
                Decimal::ZERO
            },
        };
        let risk_score = breakdown.total();

        let recommendations = self.recommendations(
            risk_score,
            max_concentration,
            concentration_symbol.as_deref(),
            leverage,
            margin_utilization,
        );

        RiskSnapshot {
            client_id: profile.client_id.clone(),
            risk_score,
            breakdown,
            leverage,
            max_concentration,
            concentration_symbol,
            margin_utilization,
            unrealized_pnl: totals.unrealized_pnl,
            total_exposure: totals.gross_notional,
            credit_utilization,
            recommendations,
            suggested_tier: RiskTier::from_score(risk_score),
            calculated_at: Utc::now(),
        }
    }

    fn recommendations(
        &self,
        score: Decimal,
        concentration: Decimal,
        symbol: Option<&str>,
        leverage: Decimal,
        margin_utilization: Decimal,
    ) -> Vec<String> {
        let c = &self.config;
        let mut out = Vec::new();
        if score > c.critical_risk_score {
            out.push("CRITICAL: Immediate risk reduction required".to_string());
        }
        if concentration > c.concentration_limit {
            out.push(format!(
                "Reduce concentration in {}: {}% of credit limit exceeds {}%",
                symbol.unwrap_or("largest position"),
                percent(concentration),
                percent(c.concentration_limit)
            ));
        }
        if leverage > c.leverage_limit {
            out.push(format!(
                "Reduce leverage from {}x to below {}x",
                leverage.round_dp(2),
                c.leverage_limit
            ));
        }
        if margin_utilization > c.margin_call_threshold {
            out.push(format!(
                "Add margin or reduce positions: margin utilization at {}%",
                percent(margin_utilization)
            ));
        }
        if score < c.low_risk_score {
            out.push("Risk profile allows for increased position sizing".to_string());
        }
        out
    }
}

/// `num / den`, zero when the denominator is zero
fn ratio(num: Decimal, den: Decimal) -> Decimal {
    if den.is_zero() {
        return Decimal::ZERO;
    }
    num.checked_div(den).unwrap_or(Decimal::MAX)
}

/// `min(value * factor, cap)`, saturating instead of overflowing
fn points(value: Decimal, factor: Decimal, cap: Decimal) -> Decimal {
    value
        .checked_mul(factor)
        .unwrap_or(Decimal::MAX)
        .min(cap)
        .max(Decimal::ZERO)
}

fn percent(value: Decimal) -> Decimal {
    value
        .checked_mul(Decimal::ONE_HUNDRED)
        .unwrap_or(Decimal::MAX)
        .round_dp(2)
        .normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskbank_core::ProfileUpdate;
    use rust_decimal_macros::dec;

    fn profile(limit: Decimal, used: Decimal, collateral: Decimal, margin: Decimal) -> CreditProfile {
        let mut p = CreditProfile::empty("C1");
        p.apply(
            &ProfileUpdate::default()
                .credit_limit(limit)
                .used_credit(used)
                .collateral_value(collateral)
                .margin_requirement(margin),
        );
        p
    }

    #[test]
    fn test_moderate_client() {
        let p = profile(dec!(10000000), dec!(2500000), dec!(15000000), dec!(1000000));
        let positions = vec![ClientExposure::new("C1", "BTC/USDT", dec!(2500000), dec!(1000000))];
        let snap = RiskScorer::default().score(&p, &positions);

        assert_eq!(snap.credit_utilization, dec!(0.25));
        assert_eq!(snap.breakdown.credit_utilization, dec!(3.75));
        assert_eq!(snap.breakdown.concentration, dec!(25));
        assert_eq!(snap.breakdown.margin_utilization, dec!(2));
        assert!(snap.risk_score > dec!(31) && snap.risk_score < dec!(32));
        // exactly at the limit is not a breach
        assert!(snap.recommendations.is_empty());
        assert_eq!(snap.suggested_tier, RiskTier::Standard);
    }

    #[test]
    fn test_zero_limit_and_collateral() {
        let p = profile(dec!(0), dec!(500), dec!(0), dec!(100));
        let positions = vec![ClientExposure::new("C1", "ETH/USDT", dec!(500), dec!(100))];
        let snap = RiskScorer::default().score(&p, &positions);
        assert_eq!(snap.risk_score, Decimal::ZERO);
        assert_eq!(snap.leverage, Decimal::ZERO);
        assert_eq!(
            snap.recommendations,
            vec!["Risk profile allows for increased position sizing".to_string()]
        );
    }

    #[test]
    fn test_extreme_inputs_stay_in_range() {
        let p = profile(dec!(0.0000001), dec!(1000000000000), dec!(0.0000001), dec!(1000000000000));
        let positions = vec![ClientExposure::new("C1", "BTC/USDT", dec!(1000000000000), dec!(0))
            .with_unrealized_pnl(dec!(-1000000000000))];
        let snap = RiskScorer::default().score(&p, &positions);
        assert_eq!(snap.risk_score, dec!(100));
        assert_eq!(
            snap.recommendations[0],
            "CRITICAL: Immediate risk reduction required"
        );
        assert_eq!(snap.suggested_tier, RiskTier::Restricted);
    }

    #[test]
    fn test_all_recommendations_in_order() {
        let p = profile(dec!(1000000), dec!(1000000), dec!(50000), dec!(900000));
        let positions = vec![ClientExposure::new("C1", "SOL/USDT", dec!(1000000), dec!(900000))
            .with_unrealized_pnl(dec!(-200000))];
        let snap = RiskScorer::default().score(&p, &positions);

        // 30 + 25 + 18 + 15 + 10
        assert_eq!(snap.risk_score, dec!(98));
        assert_eq!(snap.recommendations.len(), 4);
        assert!(snap.recommendations[0].starts_with("CRITICAL"));
        assert!(snap.recommendations[1].starts_with("Reduce concentration in SOL/USDT"));
        assert!(snap.recommendations[2].starts_with("Reduce leverage from 20"));
        assert!(snap.recommendations[3].starts_with("Add margin"));
    }

    #[test]
    fn test_unrealized_gain_adds_nothing() {
        let p = profile(dec!(1000000), dec!(0), dec!(0), dec!(0));
        let positions = vec![ClientExposure::new("C1", "BTC/USDT", dec!(0), dec!(0))
            .with_unrealized_pnl(dec!(50000))];
        let snap = RiskScorer::default().score(&p, &positions);
        assert_eq!(snap.breakdown.unrealized_loss, Decimal::ZERO);
    }

    #[test]
    fn test_loss_points_scale() {
        let p = profile(dec!(1000000), dec!(0), dec!(0), dec!(0));
        let positions = vec![ClientExposure::new("C1", "BTC/USDT", dec!(0), dec!(0))
            .with_unrealized_pnl(dec!(-50000))];
        let snap = RiskScorer::default().score(&p, &positions);
        assert_eq!(snap.breakdown.unrealized_loss, dec!(5));
    }
}
