//! Credit risk errors

use riskbank_core::ExposureError;
use riskbank_events::EventError;
use riskbank_store::StoreError;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiskError {
    #[error("Invalid exposure: {0}")]
    InvalidExposure(#[from] ExposureError),

    #[error("Client id must not be empty")]
    EmptyClient,

    #[error("Invalid profile update: {field} must not be negative, got {value}")]
    NegativeProfileField { field: &'static str, value: Decimal },

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Audit journal error: {0}")]
    Audit(#[from] EventError),
}
