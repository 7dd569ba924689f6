//! API errors
//!
//! Every variant keeps the underlying structured error so a caller can
//! tell which limit, field or transition was involved.

use std::path::PathBuf;

use riskbank_events::EventError;
use riskbank_risk::RiskError;
use riskbank_settlement::{ReconciliationError, SettlementError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unknown client: {0}")]
    UnknownClient(String),

    #[error(transparent)]
    Risk(#[from] RiskError),

    #[error(transparent)]
    Settlement(#[from] SettlementError),

    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),

    #[error("Audit journal error: {0}")]
    Audit(#[from] EventError),

    #[error("Invalid config {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("Feed line {line}: {reason}")]
    Feed { line: usize, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Short machine-readable kind for error responses
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::UnknownClient(_) => "unknown_client",
            ApiError::Risk(RiskError::InvalidExposure(_))
            | ApiError::Risk(RiskError::EmptyClient)
            | ApiError::Risk(RiskError::NegativeProfileField { .. }) => "validation",
            ApiError::Settlement(SettlementError::InvalidTrade(_))
            | ApiError::Settlement(SettlementError::Market(_))
            | ApiError::Settlement(SettlementError::Amount(_)) => "validation",
            ApiError::Settlement(SettlementError::NotFound(_)) => "not_found",
            ApiError::Settlement(SettlementError::InvalidTransition(_))
            | ApiError::Reconciliation(ReconciliationError::InvalidTransition { .. }) => {
                "invalid_transition"
            }
            ApiError::Config { .. } => "config",
            ApiError::Feed { .. } => "feed",
            _ => "internal",
        }
    }
}
