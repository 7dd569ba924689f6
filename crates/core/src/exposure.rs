//! Client exposure - one row per client and symbol

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExposureError {
    #[error("Client id must not be empty")]
    EmptyClient,

    #[error("Symbol must not be empty")]
    EmptySymbol,

    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: Decimal },
}

/// A client's position in a single symbol.
///
/// `notional` is signed (short positions are negative); credit usage is
/// always computed on its absolute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientExposure {
    pub client_id: String,
    pub symbol: String,
    pub notional: Decimal,
    pub market_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub margin_used: Decimal,
    pub risk_weight: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl ClientExposure {
    /// Create an exposure with unit risk weight and zero P&L
    pub fn new(
        client_id: impl Into<String>,
        symbol: impl Into<String>,
        notional: Decimal,
        margin_used: Decimal,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            symbol: symbol.into(),
            notional,
            market_value: notional,
            unrealized_pnl: Decimal::ZERO,
            margin_used,
            risk_weight: Decimal::ONE,
            updated_at: Utc::now(),
        }
    }

    pub fn with_unrealized_pnl(mut self, pnl: Decimal) -> Self {
        self.unrealized_pnl = pnl;
        self
    }

    pub fn with_market_value(mut self, value: Decimal) -> Self {
        self.market_value = value;
        self
    }

    pub fn with_risk_weight(mut self, weight: Decimal) -> Self {
        self.risk_weight = weight;
        self
    }

    /// Reject records that must never reach the ledger
    pub fn validate(&self) -> Result<(), ExposureError> {
        if self.client_id.trim().is_empty() {
            return Err(ExposureError::EmptyClient);
        }
        if self.symbol.trim().is_empty() {
            return Err(ExposureError::EmptySymbol);
        }
        if self.margin_used < Decimal::ZERO {
            return Err(ExposureError::Negative {
                field: "margin_used",
                value: self.margin_used,
            });
        }
        if self.risk_weight < Decimal::ZERO {
            return Err(ExposureError::Negative {
                field: "risk_weight",
                value: self.risk_weight,
            });
        }
        Ok(())
    }

    /// Absolute notional, the amount of credit this position consumes
    pub fn gross_notional(&self) -> Decimal {
        self.notional.abs()
    }
}
