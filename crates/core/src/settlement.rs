//! Settlement records and their state machine
//!
//! ```text
//! pending ──► processing ──► settled
//!    │             │
//!    ▼             ▼
//! cancelled      failed
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;

use crate::amount::Amount;
use crate::asset::Asset;
use crate::market::TradeSide;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    Pending,
    Processing,
    Settled,
    Failed,
    Cancelled,
}

impl SettlementStatus {
    pub fn can_transition_to(self, next: SettlementStatus) -> bool {
        use SettlementStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Pending, Cancelled) | (Processing, Settled) | (Processing, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SettlementStatus::Settled | SettlementStatus::Failed | SettlementStatus::Cancelled
        )
    }
}

/// Settlement cycle requested by the trade feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(ascii_case_insensitive)]
pub enum SettlementType {
    /// Same day, processing starts on creation
    #[strum(to_string = "T+0", serialize = "T0")]
    #[serde(alias = "T+0")]
    T0,
    /// Next business day
    #[default]
    #[strum(to_string = "T+1", serialize = "T1")]
    #[serde(alias = "T+1")]
    T1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InstructionType {
    Crypto,
    Fiat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InstructionDirection {
    Pay,
    Receive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InstructionStatus {
    Pending,
    Sent,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationType {
    Blockchain,
    Swift,
    Sepa,
    Ach,
    Internal,
}

/// Where an instruction moves funds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Destination {
    Wallet {
        address: String,
    },
    Bank {
        bank_name: String,
        account_number: String,
        swift_code: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementInstruction {
    pub id: String,
    #[serde(rename = "type")]
    pub instruction_type: InstructionType,
    pub asset: Asset,
    pub amount: Amount,
    pub direction: InstructionDirection,
    pub destination: Destination,
    pub reference: String,
    pub status: InstructionStatus,
    /// Blockchain tx hash or bank transfer reference returned by the mover
    pub transfer_ref: Option<String>,
    pub confirmations: u32,
    pub required_confirmations: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl SettlementInstruction {
    pub fn is_confirmed(&self) -> bool {
        self.status == InstructionStatus::Confirmed
    }
}

/// Proof that an instruction reached finality. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementConfirmation {
    pub id: String,
    pub settlement_id: String,
    pub instruction_id: String,
    #[serde(rename = "type")]
    pub confirmation_type: ConfirmationType,
    pub transaction_id: String,
    pub amount: Amount,
    pub asset: Asset,
    pub timestamp: DateTime<Utc>,
    pub confirmation_data: BTreeMap<String, String>,
    pub verified: bool,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementStateError {
    #[error("Invalid settlement transition: {from} -> {to}")]
    InvalidTransition {
        from: SettlementStatus,
        to: SettlementStatus,
    },

    #[error("Cannot settle: {unconfirmed} instruction(s) not confirmed")]
    UnconfirmedInstructions { unconfirmed: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub id: String,
    pub trade_id: String,
    pub client_id: String,
    pub counterparty_id: String,
    pub symbol: String,
    pub side: TradeSide,
    pub quantity: Amount,
    pub price: Amount,
    pub notional: Amount,
    pub settlement_type: SettlementType,
    pub settlement_date: NaiveDate,
    pub value_date: NaiveDate,
    pub status: SettlementStatus,
    pub instructions: Vec<SettlementInstruction>,
    pub confirmations: Vec<SettlementConfirmation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Settlement {
    pub fn all_instructions_confirmed(&self) -> bool {
        !self.instructions.is_empty() && self.instructions.iter().all(|i| i.is_confirmed())
    }

    pub fn instruction(&self, instruction_id: &str) -> Option<&SettlementInstruction> {
        self.instructions.iter().find(|i| i.id == instruction_id)
    }

    pub fn instruction_mut(&mut self, instruction_id: &str) -> Option<&mut SettlementInstruction> {
        self.instructions.iter_mut().find(|i| i.id == instruction_id)
    }

    /// Move to `next`, enforcing the state machine.
    ///
    /// `settled` additionally requires every instruction to be confirmed.
    pub fn transition(&mut self, next: SettlementStatus) -> Result<(), SettlementStateError> {
        if !self.status.can_transition_to(next) {
            return Err(SettlementStateError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        if next == SettlementStatus::Settled {
            let unconfirmed = self
                .instructions
                .iter()
                .filter(|i| !i.is_confirmed())
                .count();
            if unconfirmed > 0 || self.instructions.is_empty() {
                return Err(SettlementStateError::UnconfirmedInstructions { unconfirmed });
            }
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}
