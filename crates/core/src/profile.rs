//! Credit profile - per-client limit, usage and collateral

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Client credit tier
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumString, Display,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Prime,
    #[default]
    Standard,
    Cautious,
    Restricted,
}

impl RiskTier {
    /// Tier implied by a 0-100 risk score
    pub fn from_score(score: Decimal) -> Self {
        if score < Decimal::from(30) {
            RiskTier::Prime
        } else if score < Decimal::from(50) {
            RiskTier::Standard
        } else if score < Decimal::from(70) {
            RiskTier::Cautious
        } else {
            RiskTier::Restricted
        }
    }
}

/// Credit profile for one client.
///
/// # Invariant
/// `available_credit == credit_limit - used_credit` after every mutation
/// made through [`CreditProfile::apply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditProfile {
    pub client_id: String,
    pub credit_limit: Decimal,
    pub used_credit: Decimal,
    pub available_credit: Decimal,
    pub risk_score: Decimal,
    pub tier: RiskTier,
    pub collateral_value: Decimal,
    pub margin_requirement: Decimal,
    pub last_updated: DateTime<Utc>,
}

impl CreditProfile {
    /// Default profile for a client never seen before: no limit, no usage.
    pub fn empty(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            credit_limit: Decimal::ZERO,
            used_credit: Decimal::ZERO,
            available_credit: Decimal::ZERO,
            risk_score: Decimal::ZERO,
            tier: RiskTier::Standard,
            collateral_value: Decimal::ZERO,
            margin_requirement: Decimal::ZERO,
            last_updated: Utc::now(),
        }
    }

    /// Merge a partial update and recompute derived fields
    pub fn apply(&mut self, update: &ProfileUpdate) {
        if let Some(v) = update.credit_limit {
            self.credit_limit = v;
        }
        if let Some(v) = update.used_credit {
            self.used_credit = v;
        }
        if let Some(v) = update.collateral_value {
            self.collateral_value = v;
        }
        if let Some(v) = update.margin_requirement {
            self.margin_requirement = v;
        }
        if let Some(v) = update.risk_score {
            self.risk_score = v;
        }
        if let Some(v) = update.tier {
            self.tier = v;
        }
        self.available_credit = self.credit_limit - self.used_credit;
        self.last_updated = Utc::now();
    }

    /// used / limit, zero when there is no limit
    pub fn credit_utilization(&self) -> Decimal {
        if self.credit_limit.is_zero() {
            Decimal::ZERO
        } else {
            self.used_credit / self.credit_limit
        }
    }
}

/// Partial profile update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_limit: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_credit: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collateral_value: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin_requirement: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<RiskTier>,
}

impl ProfileUpdate {
    pub fn credit_limit(mut self, v: Decimal) -> Self {
        self.credit_limit = Some(v);
        self
    }

    pub fn collateral_value(mut self, v: Decimal) -> Self {
        self.collateral_value = Some(v);
        self
    }

    pub fn used_credit(mut self, v: Decimal) -> Self {
        self.used_credit = Some(v);
        self
    }

    pub fn margin_requirement(mut self, v: Decimal) -> Self {
        self.margin_requirement = Some(v);
        self
    }

    pub fn tier(mut self, v: RiskTier) -> Self {
        self.tier = Some(v);
        self
    }

    /// Names of fields carried by this update (for audit records)
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.credit_limit.is_some() {
            fields.push("credit_limit");
        }
        if self.used_credit.is_some() {
            fields.push("used_credit");
        }
        if self.collateral_value.is_some() {
            fields.push("collateral_value");
        }
        if self.margin_requirement.is_some() {
            fields.push("margin_requirement");
        }
        if self.risk_score.is_some() {
            fields.push("risk_score");
        }
        if self.tier.is_some() {
            fields.push("tier");
        }
        fields
    }

    /// First monetary field holding a negative value, if any
    pub fn first_negative(&self) -> Option<(&'static str, Decimal)> {
        [
            ("credit_limit", self.credit_limit),
            ("used_credit", self.used_credit),
            ("collateral_value", self.collateral_value),
            ("margin_requirement", self.margin_requirement),
        ]
        .into_iter()
        .find_map(|(name, v)| v.filter(|v| *v < Decimal::ZERO).map(|v| (name, v)))
    }
}
