//! External collaborators
//!
//! The engine never moves funds or reads chains itself. It hands
//! instructions to an [`AssetMover`], watches progress through a
//! [`ConfirmationSource`] and checks the final amount with a
//! [`MovementQuery`].

use async_trait::async_trait;
use riskbank_core::SettlementInstruction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::error::CollaboratorError;

/// Dispatches instructions to the outside world
#[async_trait]
pub trait AssetMover: Send + Sync {
    /// Broadcast an on-chain transfer, returning its transaction hash
    async fn send_crypto(&self, instruction: &SettlementInstruction)
        -> Result<String, CollaboratorError>;

    /// Submit a bank transfer, returning the bank's reference
    async fn send_fiat(&self, instruction: &SettlementInstruction)
        -> Result<String, CollaboratorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BankTransferStatus {
    Confirmed,
    Pending,
    Failed,
}

#[async_trait]
pub trait ConfirmationSource: Send + Sync {
    /// Current block depth of a transaction
    async fn confirmation_depth(&self, tx_hash: &str) -> Result<u32, CollaboratorError>;

    async fn bank_transfer_status(
        &self,
        reference: &str,
    ) -> Result<BankTransferStatus, CollaboratorError>;
}

#[async_trait]
pub trait MovementQuery: Send + Sync {
    /// Amount that actually moved for an instruction
    async fn actual_movement(
        &self,
        instruction: &SettlementInstruction,
    ) -> Result<Decimal, CollaboratorError>;
}
