//! Settlement and reconciliation errors

use riskbank_core::{AmountError, MarketError, ReconciliationStatus, SettlementStateError};
use riskbank_events::EventError;
use riskbank_store::StoreError;
use thiserror::Error;

/// Failure reported by an external mover, confirmation source or
/// movement query
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("{service} unavailable: {reason}")]
    Unavailable { service: &'static str, reason: String },

    #[error("Transfer {reference} rejected: {reason}")]
    Rejected { reference: String, reason: String },

    #[error("Unknown transfer reference: {0}")]
    UnknownReference(String),
}

#[derive(Error, Debug)]
pub enum SettlementError {
    #[error("Invalid trade: {0}")]
    InvalidTrade(String),

    #[error("Invalid symbol: {0}")]
    Market(#[from] MarketError),

    #[error("Invalid amount: {0}")]
    Amount(#[from] AmountError),

    #[error("Settlement not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    InvalidTransition(#[from] SettlementStateError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Audit journal error: {0}")]
    Audit(#[from] EventError),
}

#[derive(Error, Debug)]
pub enum ReconciliationError {
    #[error("Invalid reconciliation transition: {from} -> {to}")]
    InvalidTransition {
        from: ReconciliationStatus,
        to: ReconciliationStatus,
    },

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Audit journal error: {0}")]
    Audit(#[from] EventError),
}
