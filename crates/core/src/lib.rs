//! RiskBank Core - Domain types
//!
//! This crate contains the entities shared by every RiskBank service:
//! - `Amount`: Non-negative decimal wrapper for quantities, prices and transfer amounts
//! - `Asset`: Asset codes with fiat/crypto routing and confirmation depth
//! - `TradingPair` / `TradeSide`: Market identifiers for settled trades
//! - Exposure, credit profile, alert, settlement and reconciliation records

pub mod alert;
pub mod amount;
pub mod asset;
pub mod exposure;
pub mod market;
pub mod profile;
pub mod reconciliation;
pub mod settlement;

pub use alert::{AlertSeverity, AlertType, RiskAlert};
pub use amount::{Amount, AmountError};
pub use asset::{Asset, AssetError};
pub use exposure::{ClientExposure, ExposureError};
pub use market::{MarketError, TradeSide, TradingPair};
pub use profile::{CreditProfile, ProfileUpdate, RiskTier};
pub use reconciliation::{ReconciliationItem, ReconciliationStatus, ReconciliationType};
pub use settlement::{
    ConfirmationType, Destination, InstructionDirection, InstructionStatus, InstructionType,
    Settlement, SettlementConfirmation, SettlementInstruction, SettlementStateError, SettlementStatus,
    SettlementType,
};

/// Generate a fresh entity identifier
pub fn new_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}
