//! Settlement orchestrator
//!
//! Owns the settlement state machine. Dispatches instructions to the
//! asset mover, then follows each one with its own cancellable tracker
//! task until it confirms or fails. All reads and writes of a settlement
//! happen under that settlement's lock.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use riskbank_bus::{EngineEvent, EventBus};
use riskbank_core::{
    new_id, AlertSeverity, AlertType, Amount, ConfirmationType, InstructionStatus,
    InstructionType, RiskAlert, Settlement, SettlementConfirmation, SettlementStateError,
    SettlementStatus, SettlementType, TradeSide, TradingPair,
};
use riskbank_events::{AuditAction, AuditRecord, AuditSink};
use riskbank_store::{AlertRepository, KeyedLocks, SettlementRepository};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::calendar;
use crate::collaborators::{AssetMover, BankTransferStatus, ConfirmationSource};
use crate::config::SettlementConfig;
use crate::error::SettlementError;
use crate::instruction::InstructionPlanner;
use crate::reconciliation::ReconciliationEngine;

/// A completed trade as delivered by the trade feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeData {
    pub trade_id: String,
    pub client_id: String,
    pub counterparty_id: String,
    pub symbol: String,
    pub side: TradeSide,
    pub quantity: Decimal,
    pub price: Decimal,
    #[serde(default)]
    pub settlement_type: SettlementType,
}

/// Outbound collaborators used while a settlement is in flight
#[derive(Clone)]
pub struct Collaborators {
    pub mover: Arc<dyn AssetMover>,
    pub confirmations: Arc<dyn ConfirmationSource>,
}

enum TrackOutcome {
    Confirmed { depth: u32 },
    Failed { reason: String, depth: u32 },
}

pub struct SettlementOrchestrator {
    config: SettlementConfig,
    settlements: Arc<dyn SettlementRepository>,
    alerts: Arc<dyn AlertRepository>,
    collaborators: Collaborators,
    reconciler: Arc<ReconciliationEngine>,
    audit: Arc<dyn AuditSink>,
    bus: EventBus,
    locks: KeyedLocks,
    /// instruction id -> confirmation tracker
    trackers: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl SettlementOrchestrator {
    pub fn new<S>(
        config: SettlementConfig,
        store: Arc<S>,
        collaborators: Collaborators,
        reconciler: Arc<ReconciliationEngine>,
        audit: Arc<dyn AuditSink>,
        bus: EventBus,
    ) -> Arc<Self>
    where
        S: SettlementRepository + AlertRepository + 'static,
    {
        Arc::new(Self {
            config,
            settlements: store.clone(),
            alerts: store,
            collaborators,
            reconciler,
            audit,
            bus,
            locks: KeyedLocks::new(),
            trackers: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    /// Create a pending settlement with its two instructions.
    ///
    /// T+0 trades go straight into processing; the returned settlement
    /// then reflects the dispatch result.
    pub async fn create_settlement(
        self: &Arc<Self>,
        trade: TradeData,
    ) -> Result<Settlement, SettlementError> {
        for (field, value) in [
            ("trade_id", &trade.trade_id),
            ("client_id", &trade.client_id),
            ("counterparty_id", &trade.counterparty_id),
        ] {
            if value.trim().is_empty() {
                return Err(SettlementError::InvalidTrade(format!("{} must not be empty", field)));
            }
        }
        let pair: TradingPair = trade.symbol.parse()?;
        let quantity = Amount::positive(trade.quantity)?;
        let price = Amount::positive(trade.price)?;
        let notional = quantity.checked_mul(&price)?;

        let now = Utc::now();
        let settlement_date = calendar::settlement_date(now.date_naive(), trade.settlement_type);
        let instructions = InstructionPlanner::new(&self.config).plan(
            &trade.trade_id,
            &pair,
            trade.side,
            quantity,
            notional,
        );

        let settlement = Settlement {
            id: new_id("stl"),
            trade_id: trade.trade_id,
            client_id: trade.client_id,
            counterparty_id: trade.counterparty_id,
            symbol: pair.to_string(),
            side: trade.side,
            quantity,
            price,
            notional,
            settlement_type: trade.settlement_type,
            settlement_date,
            value_date: settlement_date,
            status: SettlementStatus::Pending,
            instructions,
            confirmations: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.settlements.insert_settlement(settlement.clone()).await?;

        tracing::info!(
            settlement_id = %settlement.id,
            trade_id = %settlement.trade_id,
            client = %settlement.client_id,
            symbol = %settlement.symbol,
            notional = %settlement.notional,
            settlement_type = %settlement.settlement_type,
            "Settlement created"
        );
        self.bus.publish(EngineEvent::SettlementCreated {
            settlement_id: settlement.id.clone(),
            trade_id: settlement.trade_id.clone(),
            client_id: settlement.client_id.clone(),
        });

        if settlement.settlement_type == SettlementType::T0 {
            self.process_settlement(&settlement.id).await?;
            return self.load(&settlement.id).await;
        }
        Ok(settlement)
    }

    /// Move a pending settlement into processing and dispatch its
    /// instructions.
    ///
    /// Returns false when a dispatch fails; the settlement is then
    /// `failed`. On success a tracker follows each instruction.
    pub async fn process_settlement(
        self: &Arc<Self>,
        settlement_id: &str,
    ) -> Result<bool, SettlementError> {
        let _guard = self.locks.lock(settlement_id).await;
        let mut settlement = self.load(settlement_id).await?;

        self.transition(&mut settlement, SettlementStatus::Processing)?;
        self.settlements.update_settlement(settlement.clone()).await?;

        for idx in 0..settlement.instructions.len() {
            let instruction = &settlement.instructions[idx];
            let dispatched = match instruction.instruction_type {
                InstructionType::Crypto => self.collaborators.mover.send_crypto(instruction).await,
                InstructionType::Fiat => self.collaborators.mover.send_fiat(instruction).await,
            };

            let instruction = &mut settlement.instructions[idx];
            match dispatched {
                Ok(transfer_ref) => {
                    instruction.status = InstructionStatus::Sent;
                    instruction.transfer_ref = Some(transfer_ref.clone());
                    tracing::debug!(
                        settlement_id,
                        instruction_id = %instruction.id,
                        transfer_ref = %transfer_ref,
                        "Instruction sent"
                    );
                    self.bus.publish(EngineEvent::InstructionSent {
                        settlement_id: settlement_id.to_string(),
                        instruction_id: instruction.id.clone(),
                        transfer_ref,
                    });
                }
                Err(e) => {
                    instruction.status = InstructionStatus::Failed;
                    instruction.failure_reason = Some(e.to_string());
                    tracing::error!(
                        settlement_id,
                        instruction_id = %instruction.id,
                        error = %e,
                        "Instruction dispatch failed"
                    );
                    self.transition(&mut settlement, SettlementStatus::Failed)?;
                    self.settlements.update_settlement(settlement.clone()).await?;
                    self.flag_stranded_legs(&settlement).await?;
                    return Ok(false);
                }
            }
        }

        settlement.updated_at = Utc::now();
        self.settlements.update_settlement(settlement.clone()).await?;
        for instruction in &settlement.instructions {
            self.spawn_tracker(&settlement.id, &instruction.id, instruction.instruction_type);
        }
        Ok(true)
    }

    /// Cancel a settlement that has not started processing
    pub async fn cancel_settlement(
        &self,
        settlement_id: &str,
        by: &str,
    ) -> Result<Settlement, SettlementError> {
        let _guard = self.locks.lock(settlement_id).await;
        let mut settlement = self.load(settlement_id).await?;
        if !settlement.status.can_transition_to(SettlementStatus::Cancelled) {
            return Err(SettlementStateError::InvalidTransition {
                from: settlement.status,
                to: SettlementStatus::Cancelled,
            }
            .into());
        }
        self.audit.record(AuditRecord::new(
            by,
            AuditAction::SettlementCancelled {
                settlement_id: settlement_id.to_string(),
            },
        ))?;
        self.transition(&mut settlement, SettlementStatus::Cancelled)?;
        self.settlements.update_settlement(settlement.clone()).await?;
        Ok(settlement)
    }

    pub async fn get_settlement(&self, settlement_id: &str) -> Result<Option<Settlement>, SettlementError> {
        Ok(self.settlements.get_settlement(settlement_id).await?)
    }

    /// Newest first
    pub async fn settlements_for_client(&self, client_id: &str) -> Result<Vec<Settlement>, SettlementError> {
        Ok(self.settlements.settlements_for_client(client_id).await?)
    }

    /// Trackers still running
    pub fn active_trackers(&self) -> usize {
        self.trackers_map()
            .values()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Wait for every tracker to finish
    pub async fn drain(&self) {
        loop {
            let handles: Vec<_> = self.trackers_map().drain().map(|(_, h)| h).collect();
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    if !e.is_cancelled() {
                        tracing::error!(error = %e, "Confirmation tracker panicked");
                    }
                }
            }
        }
    }

    /// Abort every tracker. Instructions they followed stay `sent`.
    pub fn shutdown(&self) {
        let mut trackers = self.trackers_map();
        let count = trackers.len();
        for (_, handle) in trackers.drain() {
            handle.abort();
        }
        tracing::info!(aborted = count, "Confirmation trackers stopped");
    }

    fn trackers_map(&self) -> MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        self.trackers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn load(&self, settlement_id: &str) -> Result<Settlement, SettlementError> {
        self.settlements
            .get_settlement(settlement_id)
            .await?
            .ok_or_else(|| SettlementError::NotFound(settlement_id.to_string()))
    }

    fn transition(
        &self,
        settlement: &mut Settlement,
        next: SettlementStatus,
    ) -> Result<(), SettlementError> {
        let from = settlement.status;
        settlement.transition(next)?;
        tracing::info!(settlement_id = %settlement.id, %from, to = %next, "Settlement status changed");
        self.bus.publish(EngineEvent::SettlementStatusChanged {
            settlement_id: settlement.id.clone(),
            from,
            to: next,
        });
        Ok(())
    }

    fn spawn_tracker(self: &Arc<Self>, settlement_id: &str, instruction_id: &str, kind: InstructionType) {
        let this = Arc::clone(self);
        let settlement_id = settlement_id.to_string();
        let instruction_id = instruction_id.to_string();
        let key = instruction_id.clone();

        let handle = tokio::spawn(async move {
            let outcome = match kind {
                InstructionType::Crypto => this.track_crypto(&settlement_id, &instruction_id).await,
                InstructionType::Fiat => this.track_fiat(&settlement_id, &instruction_id).await,
            };
            let result = match outcome {
                Ok(TrackOutcome::Confirmed { depth }) => {
                    this.confirm_instruction(&settlement_id, &instruction_id, depth).await
                }
                Ok(TrackOutcome::Failed { reason, depth }) => {
                    this.fail_instruction(&settlement_id, &instruction_id, reason, depth).await
                }
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                tracing::error!(
                    settlement_id = %settlement_id,
                    instruction_id = %instruction_id,
                    error = %e,
                    "Confirmation tracking failed"
                );
            }
            this.trackers_map().remove(&instruction_id);
        });

        let mut trackers = self.trackers_map();
        trackers.retain(|_, h| !h.is_finished());
        trackers.insert(key, handle);
    }

    /// (transfer reference, required confirmations) of a sent instruction
    async fn sent_instruction(
        &self,
        settlement_id: &str,
        instruction_id: &str,
    ) -> Result<Option<(String, u32)>, SettlementError> {
        let settlement = self.load(settlement_id).await?;
        Ok(settlement.instruction(instruction_id).and_then(|i| {
            if i.status == InstructionStatus::Sent {
                i.transfer_ref.clone().map(|r| (r, i.required_confirmations))
            } else {
                None
            }
        }))
    }

    /// Poll chain depth until it reaches the required confirmations or
    /// the window closes
    async fn track_crypto(
        &self,
        settlement_id: &str,
        instruction_id: &str,
    ) -> Result<TrackOutcome, SettlementError> {
        let Some((tx_hash, required)) = self.sent_instruction(settlement_id, instruction_id).await? else {
            return Ok(TrackOutcome::Failed {
                reason: "instruction not in sent state".to_string(),
                depth: 0,
            });
        };
        let window = self.config.crypto_confirmation_window();
        let deadline = Instant::now() + window;
        let mut depth = 0;

        loop {
            tokio::time::sleep(self.config.crypto_poll_interval()).await;
            match self.collaborators.confirmations.confirmation_depth(&tx_hash).await {
                Ok(current) => {
                    if current >= required {
                        return Ok(TrackOutcome::Confirmed { depth: current });
                    }
                    if current != depth {
                        depth = current;
                        self.record_progress(settlement_id, instruction_id, depth).await?;
                    }
                }
                Err(e) => {
                    return Ok(TrackOutcome::Failed {
                        reason: format!("confirmation source error: {}", e),
                        depth,
                    })
                }
            }
            if Instant::now() >= deadline {
                return Ok(TrackOutcome::Failed {
                    reason: format!(
                        "{} of {} confirmations after {}",
                        depth,
                        required,
                        format_window(window)
                    ),
                    depth,
                });
            }
        }
    }

    /// Check the bank after the business-day delay, re-checking while the
    /// transfer is pending and the window is open
    async fn track_fiat(
        &self,
        settlement_id: &str,
        instruction_id: &str,
    ) -> Result<TrackOutcome, SettlementError> {
        let Some((reference, _)) = self.sent_instruction(settlement_id, instruction_id).await? else {
            return Ok(TrackOutcome::Failed {
                reason: "instruction not in sent state".to_string(),
                depth: 0,
            });
        };
        let window = self.config.fiat_confirmation_window();
        let deadline = Instant::now() + window;

        loop {
            tokio::time::sleep(self.config.fiat_check_delay()).await;
            let status = self
                .collaborators
                .confirmations
                .bank_transfer_status(&reference)
                .await;
            match status {
                Ok(BankTransferStatus::Confirmed) => return Ok(TrackOutcome::Confirmed { depth: 1 }),
                Ok(BankTransferStatus::Failed) => {
                    return Ok(TrackOutcome::Failed {
                        reason: format!("bank reported transfer {} failed", reference),
                        depth: 0,
                    })
                }
                Ok(BankTransferStatus::Pending) if Instant::now() >= deadline => {
                    return Ok(TrackOutcome::Failed {
                        reason: format!("bank transfer still pending after {}", format_window(window)),
                        depth: 0,
                    })
                }
                Ok(BankTransferStatus::Pending) => {
                    tracing::debug!(settlement_id, instruction_id, "Bank transfer pending");
                }
                Err(e) => {
                    return Ok(TrackOutcome::Failed {
                        reason: format!("bank status check failed: {}", e),
                        depth: 0,
                    })
                }
            }
        }
    }

    async fn record_progress(
        &self,
        settlement_id: &str,
        instruction_id: &str,
        depth: u32,
    ) -> Result<(), SettlementError> {
        let _guard = self.locks.lock(settlement_id).await;
        let mut settlement = self.load(settlement_id).await?;
        if let Some(instruction) = settlement.instruction_mut(instruction_id) {
            if instruction.status == InstructionStatus::Sent {
                instruction.confirmations = depth;
                tracing::debug!(
                    settlement_id,
                    instruction_id,
                    depth,
                    required = instruction.required_confirmations,
                    "Confirmation progress"
                );
                settlement.updated_at = Utc::now();
                self.settlements.update_settlement(settlement).await?;
            }
        }
        Ok(())
    }

    /// Mark an instruction confirmed, append its confirmation record,
    /// settle when every instruction is confirmed, then reconcile
    async fn confirm_instruction(
        &self,
        settlement_id: &str,
        instruction_id: &str,
        depth: u32,
    ) -> Result<(), SettlementError> {
        let settlement = {
            let _guard = self.locks.lock(settlement_id).await;
            let mut settlement = self.load(settlement_id).await?;
            if settlement.status != SettlementStatus::Processing {
                return Ok(());
            }
            let Some(instruction) = settlement.instruction_mut(instruction_id) else {
                return Ok(());
            };
            if instruction.status != InstructionStatus::Sent {
                return Ok(());
            }
            instruction.status = InstructionStatus::Confirmed;
            instruction.confirmations = depth;

            let confirmation_type = match instruction.instruction_type {
                InstructionType::Crypto => ConfirmationType::Blockchain,
                InstructionType::Fiat => ConfirmationType::Swift,
            };
            let mut confirmation_data = BTreeMap::new();
            confirmation_data.insert("confirmations".to_string(), depth.to_string());
            confirmation_data.insert(
                "required".to_string(),
                instruction.required_confirmations.to_string(),
            );
            confirmation_data.insert("direction".to_string(), instruction.direction.to_string());
            let confirmation = SettlementConfirmation {
                id: new_id("cnf"),
                settlement_id: settlement_id.to_string(),
                instruction_id: instruction_id.to_string(),
                confirmation_type,
                transaction_id: instruction.transfer_ref.clone().unwrap_or_default(),
                amount: instruction.amount,
                asset: instruction.asset.clone(),
                timestamp: Utc::now(),
                confirmation_data,
                verified: true,
            };
            settlement.confirmations.push(confirmation);

            tracing::info!(settlement_id, instruction_id, depth, "Instruction confirmed");
            self.bus.publish(EngineEvent::InstructionConfirmed {
                settlement_id: settlement_id.to_string(),
                instruction_id: instruction_id.to_string(),
                confirmations: depth,
            });

            if settlement.all_instructions_confirmed() {
                self.transition(&mut settlement, SettlementStatus::Settled)?;
            } else {
                settlement.updated_at = Utc::now();
            }
            self.settlements.update_settlement(settlement.clone()).await?;
            settlement
        };

        match self.reconciler.reconcile(&settlement).await {
            Ok(report) if !report.discrepancies.is_empty() => {
                tracing::debug!(
                    settlement_id,
                    discrepancies = report.discrepancies.len(),
                    "Reconciliation flagged discrepancies"
                );
            }
            Ok(_) => {}
            Err(e) => {
                // the scheduled sweep picks it up again
                tracing::error!(settlement_id, error = %e, "Reconciliation failed");
            }
        }
        Ok(())
    }

    /// Fail one instruction. The settlement stays in processing and a
    /// counterparty alert is raised for manual follow-up.
    async fn fail_instruction(
        &self,
        settlement_id: &str,
        instruction_id: &str,
        reason: String,
        depth: u32,
    ) -> Result<(), SettlementError> {
        let _guard = self.locks.lock(settlement_id).await;
        let mut settlement = self.load(settlement_id).await?;
        let client_id = settlement.client_id.clone();
        let Some(instruction) = settlement.instruction_mut(instruction_id) else {
            return Ok(());
        };
        if instruction.status != InstructionStatus::Sent {
            return Ok(());
        }
        instruction.status = InstructionStatus::Failed;
        instruction.confirmations = depth;
        instruction.failure_reason = Some(reason.clone());
        let required = instruction.required_confirmations;
        let asset = instruction.asset.clone();
        settlement.updated_at = Utc::now();
        self.settlements.update_settlement(settlement).await?;

        tracing::error!(
            settlement_id,
            instruction_id,
            client = %client_id,
            reason = %reason,
            "Instruction failed, settlement partially settled"
        );
        self.bus.publish(EngineEvent::InstructionFailed {
            settlement_id: settlement_id.to_string(),
            instruction_id: instruction_id.to_string(),
            client_id: client_id.clone(),
            reason: reason.clone(),
        });

        self.raise_counterparty_alert(RiskAlert::new(
            client_id,
            AlertType::Counterparty,
            AlertSeverity::High,
            format!(
                "{} instruction {} of settlement {} failed: {}",
                asset, instruction_id, settlement_id, reason
            ),
            Decimal::from(required),
            Decimal::from(depth),
        ))
        .await
    }

    /// Legs that went out before a later leg failed to dispatch. The
    /// settlement is failed, so nothing tracks them; each needs a manual
    /// unwind.
    async fn flag_stranded_legs(&self, settlement: &Settlement) -> Result<(), SettlementError> {
        for instruction in settlement
            .instructions
            .iter()
            .filter(|i| i.status == InstructionStatus::Sent)
        {
            tracing::error!(
                settlement_id = %settlement.id,
                instruction_id = %instruction.id,
                transfer_ref = ?instruction.transfer_ref,
                "Instruction sent for a failed settlement"
            );
            self.raise_counterparty_alert(RiskAlert::new(
                settlement.client_id.clone(),
                AlertType::Counterparty,
                AlertSeverity::High,
                format!(
                    "{} instruction {} of failed settlement {} was already sent ({}), unwind required",
                    instruction.asset,
                    instruction.id,
                    settlement.id,
                    instruction.transfer_ref.as_deref().unwrap_or("no reference")
                ),
                Decimal::ZERO,
                instruction.amount.value(),
            ))
            .await?;
        }
        Ok(())
    }

    async fn raise_counterparty_alert(&self, alert: RiskAlert) -> Result<(), SettlementError> {
        self.alerts.insert_alert(alert.clone()).await?;
        self.bus.publish(EngineEvent::RiskAlertRaised { alert });
        Ok(())
    }
}

fn format_window(window: Duration) -> String {
    let secs = window.as_secs();
    if secs >= 3600 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}s", secs)
    }
}
