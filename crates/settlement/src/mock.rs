//! Mock collaborators for tests and simulations
//!
//! Deterministic stand-ins for the asset mover, the chain/bank
//! confirmation source and the movement query. Behaviour can be changed
//! at runtime to drive failure paths.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use riskbank_core::{new_id, Asset, SettlementInstruction};
use rust_decimal::Decimal;

use crate::collaborators::{AssetMover, BankTransferStatus, ConfirmationSource, MovementQuery};
use crate::error::CollaboratorError;

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Accepts every instruction unless its asset was marked as failing
#[derive(Default)]
pub struct MockMover {
    failing: Mutex<HashSet<Asset>>,
    sent: Mutex<Vec<(String, String)>>,
}

impl MockMover {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject dispatches of `asset` from now on
    pub fn fail_asset(&self, asset: Asset) {
        locked(&self.failing).insert(asset);
    }

    /// (instruction id, returned reference) for every accepted dispatch
    pub fn sent(&self) -> Vec<(String, String)> {
        locked(&self.sent).clone()
    }

    fn dispatch(&self, instruction: &SettlementInstruction, prefix: &str) -> Result<String, CollaboratorError> {
        if locked(&self.failing).contains(&instruction.asset) {
            return Err(CollaboratorError::Rejected {
                reference: instruction.reference.clone(),
                reason: format!("{} transfers unavailable", instruction.asset),
            });
        }
        let reference = new_id(prefix);
        locked(&self.sent).push((instruction.id.clone(), reference.clone()));
        Ok(reference)
    }
}

#[async_trait]
impl AssetMover for MockMover {
    async fn send_crypto(
        &self,
        instruction: &SettlementInstruction,
    ) -> Result<String, CollaboratorError> {
        self.dispatch(instruction, "0x")
    }

    async fn send_fiat(
        &self,
        instruction: &SettlementInstruction,
    ) -> Result<String, CollaboratorError> {
        self.dispatch(instruction, "FT")
    }
}

/// Chain depth advances by `blocks_per_poll` each time a hash is queried
pub struct MockConfirmationSource {
    blocks_per_poll: Mutex<u32>,
    depths: Mutex<HashMap<String, u32>>,
    bank_status: Mutex<BankTransferStatus>,
    unreachable: Mutex<bool>,
}

impl MockConfirmationSource {
    pub fn new(blocks_per_poll: u32) -> Self {
        Self {
            blocks_per_poll: Mutex::new(blocks_per_poll),
            depths: Mutex::new(HashMap::new()),
            bank_status: Mutex::new(BankTransferStatus::Confirmed),
            unreachable: Mutex::new(false),
        }
    }

    /// Stop producing blocks; pending crypto transfers never confirm
    pub fn stall(&self) {
        *locked(&self.blocks_per_poll) = 0;
    }

    pub fn set_blocks_per_poll(&self, blocks: u32) {
        *locked(&self.blocks_per_poll) = blocks;
    }

    pub fn set_bank_status(&self, status: BankTransferStatus) {
        *locked(&self.bank_status) = status;
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        *locked(&self.unreachable) = unreachable;
    }

    fn check_reachable(&self) -> Result<(), CollaboratorError> {
        if *locked(&self.unreachable) {
            Err(CollaboratorError::Unavailable {
                service: "confirmation source",
                reason: "connection refused".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl Default for MockConfirmationSource {
    fn default() -> Self {
        Self::new(3)
    }
}

#[async_trait]
impl ConfirmationSource for MockConfirmationSource {
    async fn confirmation_depth(&self, tx_hash: &str) -> Result<u32, CollaboratorError> {
        self.check_reachable()?;
        let step = *locked(&self.blocks_per_poll);
        let mut depths = locked(&self.depths);
        let depth = depths.entry(tx_hash.to_string()).or_insert(0);
        *depth += step;
        Ok(*depth)
    }

    async fn bank_transfer_status(
        &self,
        _reference: &str,
    ) -> Result<BankTransferStatus, CollaboratorError> {
        self.check_reachable()?;
        Ok(*locked(&self.bank_status))
    }
}

/// Reports the expected amount unless an override is set for the
/// instruction's reference
#[derive(Default)]
pub struct MockMovementQuery {
    overrides: Mutex<HashMap<String, Decimal>>,
    latency: Mutex<Option<Duration>>,
}

impl MockMovementQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_actual(&self, reference: impl Into<String>, amount: Decimal) {
        locked(&self.overrides).insert(reference.into(), amount);
    }

    /// Make every query take `latency` before answering
    pub fn set_latency(&self, latency: Duration) {
        *locked(&self.latency) = Some(latency);
    }
}

#[async_trait]
impl MovementQuery for MockMovementQuery {
    async fn actual_movement(
        &self,
        instruction: &SettlementInstruction,
    ) -> Result<Decimal, CollaboratorError> {
        let latency = *locked(&self.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(locked(&self.overrides)
            .get(&instruction.reference)
            .copied()
            .unwrap_or_else(|| instruction.amount.value()))
    }
}
