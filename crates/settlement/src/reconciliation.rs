//! Reconciliation engine
//!
//! Compares what each confirmed instruction was supposed to move with
//! what actually moved. Only exceptions are stored. An instruction is
//! flagged at most once, whatever the item's later status.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use riskbank_bus::{spawn_periodic, EngineEvent, EventBus, PeriodicHandle};
use riskbank_core::{ReconciliationItem, ReconciliationStatus, ReconciliationType, Settlement};
use riskbank_events::{AuditAction, AuditRecord, AuditSink};
use riskbank_store::{ReconciliationRepository, SettlementRepository};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::collaborators::MovementQuery;
use crate::config::ReconciliationConfig;
use crate::error::ReconciliationError;

/// Manual resolution input. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationUpdate {
    #[serde(default)]
    pub status: Option<ReconciliationStatus>,
    #[serde(default)]
    pub investigation_notes: Option<String>,
}

impl ReconciliationUpdate {
    pub fn status(status: ReconciliationStatus) -> Self {
        Self {
            status: Some(status),
            investigation_notes: None,
        }
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.investigation_notes = Some(notes.into());
        self
    }
}

/// Outcome of reconciling one settlement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub checked: usize,
    pub matched: usize,
    /// Already flagged earlier, not checked again
    pub skipped: usize,
    /// Movement query failed; retried by the next sweep
    pub unavailable: usize,
    pub discrepancies: Vec<ReconciliationItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTotals {
    pub count: usize,
    pub total_difference: Decimal,
}

impl StatusTotals {
    fn add(&mut self, item: &ReconciliationItem) {
        self.count += 1;
        self.total_difference += item.difference.abs();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub unmatched: StatusTotals,
    pub investigating: StatusTotals,
    pub resolved: StatusTotals,
}

impl ReconciliationSummary {
    pub fn open(&self) -> usize {
        self.unmatched.count + self.investigating.count
    }
}

pub struct ReconciliationEngine {
    config: ReconciliationConfig,
    items: Arc<dyn ReconciliationRepository>,
    settlements: Arc<dyn SettlementRepository>,
    movements: Arc<dyn MovementQuery>,
    audit: Arc<dyn AuditSink>,
    bus: EventBus,
    /// Held only around item check-then-insert and read-modify-write,
    /// never across a movement query
    item_lock: Mutex<()>,
}

impl ReconciliationEngine {
    pub fn new(
        config: ReconciliationConfig,
        items: Arc<dyn ReconciliationRepository>,
        settlements: Arc<dyn SettlementRepository>,
        movements: Arc<dyn MovementQuery>,
        audit: Arc<dyn AuditSink>,
        bus: EventBus,
    ) -> Self {
        Self {
            config,
            items,
            settlements,
            movements,
            audit,
            bus,
            item_lock: Mutex::new(()),
        }
    }

    /// Check every confirmed instruction of `settlement`
    pub async fn reconcile(
        &self,
        settlement: &Settlement,
    ) -> Result<ReconcileReport, ReconciliationError> {
        let mut report = ReconcileReport::default();

        for instruction in settlement.instructions.iter().filter(|i| i.is_confirmed()) {
            if self.items.find_by_reference(&instruction.id).await?.is_some() {
                report.skipped += 1;
                continue;
            }

            let actual = match self.movements.actual_movement(instruction).await {
                Ok(actual) => actual,
                Err(e) => {
                    tracing::warn!(
                        settlement_id = %settlement.id,
                        instruction_id = %instruction.id,
                        error = %e,
                        "Actual movement unavailable"
                    );
                    report.unavailable += 1;
                    continue;
                }
            };

            let expected = instruction.amount.value();
            if (actual - expected).abs() <= self.config.tolerance {
                report.checked += 1;
                report.matched += 1;
                continue;
            }

            let item = ReconciliationItem::unmatched(
                ReconciliationType::Settlement,
                instruction.id.clone(),
                Some(settlement.id.clone()),
                instruction.asset.clone(),
                expected,
                actual,
            );
            {
                let _items = self.item_lock.lock().await;
                // a concurrent run may have flagged it while we queried
                if self.items.find_by_reference(&instruction.id).await?.is_some() {
                    report.skipped += 1;
                    continue;
                }
                self.items.insert_item(item.clone()).await?;
            }
            report.checked += 1;

            tracing::warn!(
                settlement_id = %settlement.id,
                instruction_id = %instruction.id,
                asset = %instruction.asset,
                expected = %expected,
                actual = %actual,
                difference = %item.difference,
                "Reconciliation discrepancy"
            );
            self.bus.publish(EngineEvent::ReconciliationDiscrepancy { item: item.clone() });
            report.discrepancies.push(item);
        }
        Ok(report)
    }

    /// Re-check settlements created within the lookback window
    pub async fn run_sweep(&self) -> Result<ReconcileReport, ReconciliationError> {
        let hours = self.config.lookback_hours.clamp(0, 24 * 365 * 10);
        let since = Utc::now() - ChronoDuration::hours(hours);
        let settlements = self.settlements.settlements_created_since(since).await?;

        let mut total = ReconcileReport::default();
        for settlement in &settlements {
            let report = self.reconcile(settlement).await?;
            total.checked += report.checked;
            total.matched += report.matched;
            total.skipped += report.skipped;
            total.unavailable += report.unavailable;
            total.discrepancies.extend(report.discrepancies);
        }
        tracing::info!(
            settlements = settlements.len(),
            checked = total.checked,
            discrepancies = total.discrepancies.len(),
            "Reconciliation sweep complete"
        );
        Ok(total)
    }

    /// Start the scheduled sweep
    pub fn start(self: Arc<Self>) -> PeriodicHandle {
        let period = self.config.sweep_interval();
        spawn_periodic("reconciliation-sweep", period, move || {
            let engine = self.clone();
            async move {
                if let Err(e) = engine.run_sweep().await {
                    tracing::error!(error = %e, "Reconciliation sweep failed");
                }
            }
        })
    }

    /// Items with the given status, or all items
    pub async fn get_items(
        &self,
        status: Option<ReconciliationStatus>,
    ) -> Result<Vec<ReconciliationItem>, ReconciliationError> {
        Ok(self.items.list_items(status).await?)
    }

    /// Manual resolution. Returns false for an unknown id.
    pub async fn update_item(
        &self,
        item_id: &str,
        update: &ReconciliationUpdate,
        by: &str,
    ) -> Result<bool, ReconciliationError> {
        let _items = self.item_lock.lock().await;
        let Some(mut item) = self.items.get_item(item_id).await? else {
            return Ok(false);
        };

        let from = item.status;
        if let Some(to) = update.status {
            if !from.can_transition_to(to) {
                return Err(ReconciliationError::InvalidTransition { from, to });
            }
            item.status = to;
        }
        if let Some(ref notes) = update.investigation_notes {
            item.investigation_notes = Some(notes.clone());
        }
        let to = item.status;

        self.audit.record(AuditRecord::new(
            by,
            AuditAction::ReconciliationUpdated {
                item_id: item_id.to_string(),
                from_status: from.to_string(),
                to_status: to.to_string(),
            },
        ))?;
        self.items.update_item(item).await?;
        tracing::info!(item_id, %from, %to, by, "Reconciliation item updated");
        Ok(true)
    }

    pub async fn summary(&self) -> Result<ReconciliationSummary, ReconciliationError> {
        let mut summary = ReconciliationSummary::default();
        for item in self.items.list_items(None).await? {
            match item.status {
                ReconciliationStatus::Unmatched => summary.unmatched.add(&item),
                ReconciliationStatus::Investigating => summary.investigating.add(&item),
                ReconciliationStatus::Resolved => summary.resolved.add(&item),
                ReconciliationStatus::Matched => {}
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockMovementQuery;
    use riskbank_core::{
        Amount, Asset, Destination, InstructionDirection, InstructionStatus, InstructionType,
        SettlementInstruction, SettlementStatus, SettlementType, TradeSide,
    };
    use riskbank_events::MemoryJournal;
    use riskbank_store::InMemoryStore;
    use rust_decimal_macros::dec;

    struct Fixture {
        store: Arc<InMemoryStore>,
        movements: Arc<MockMovementQuery>,
        journal: Arc<MemoryJournal>,
        engine: ReconciliationEngine,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let movements = Arc::new(MockMovementQuery::new());
        let journal = Arc::new(MemoryJournal::new());
        let engine = ReconciliationEngine::new(
            ReconciliationConfig::default(),
            store.clone(),
            store.clone(),
            movements.clone(),
            journal.clone(),
            EventBus::default(),
        );
        Fixture {
            store,
            movements,
            journal,
            engine,
        }
    }

    fn settlement(amount: Decimal, status: InstructionStatus) -> Settlement {
        let now = Utc::now();
        Settlement {
            id: "stl-1".into(),
            trade_id: "T1".into(),
            client_id: "C1".into(),
            counterparty_id: "CP".into(),
            symbol: "BTC/USDT".into(),
            side: TradeSide::Buy,
            quantity: Amount::new(dec!(1)).unwrap(),
            price: Amount::new(amount).unwrap(),
            notional: Amount::new(amount).unwrap(),
            settlement_type: SettlementType::T1,
            settlement_date: now.date_naive(),
            value_date: now.date_naive(),
            status: SettlementStatus::Processing,
            instructions: vec![SettlementInstruction {
                id: "ins-1".into(),
                instruction_type: InstructionType::Crypto,
                asset: Asset::Usdt,
                amount: Amount::new(amount).unwrap(),
                direction: InstructionDirection::Pay,
                destination: Destination::Wallet { address: "w".into() },
                reference: "T1-pay-USDT".into(),
                status,
                transfer_ref: Some("0xabc".into()),
                confirmations: 12,
                required_confirmations: 12,
                failure_reason: None,
            }],
            confirmations: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_discrepancy_above_tolerance() {
        let f = fixture();
        f.movements.set_actual("T1-pay-USDT", dec!(100.0015));
        let report = f
            .engine
            .reconcile(&settlement(dec!(100.0000), InstructionStatus::Confirmed))
            .await
            .unwrap();

        assert_eq!(report.discrepancies.len(), 1);
        let item = &report.discrepancies[0];
        assert_eq!(item.difference, dec!(0.0015));
        assert_eq!(item.status, ReconciliationStatus::Unmatched);
        assert_eq!(item.reference, "ins-1");
        assert_eq!(item.settlement_id.as_deref(), Some("stl-1"));
    }

    #[tokio::test]
    async fn test_exactly_at_tolerance_is_a_match() {
        let f = fixture();
        f.movements.set_actual("T1-pay-USDT", dec!(100.001));
        let report = f
            .engine
            .reconcile(&settlement(dec!(100), InstructionStatus::Confirmed))
            .await
            .unwrap();
        assert!(report.discrepancies.is_empty());
        assert_eq!(report.matched, 1);

        f.movements.set_actual("T1-pay-USDT", dec!(99.999));
        let report = f
            .engine
            .reconcile(&settlement(dec!(100), InstructionStatus::Confirmed))
            .await
            .unwrap();
        assert!(report.discrepancies.is_empty());
        assert!(f.engine.get_items(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_twice_flags_once() {
        let f = fixture();
        f.movements.set_actual("T1-pay-USDT", dec!(90));
        let s = settlement(dec!(100), InstructionStatus::Confirmed);
        f.engine.reconcile(&s).await.unwrap();
        let second = f.engine.reconcile(&s).await.unwrap();
        assert!(second.discrepancies.is_empty());
        assert_eq!(second.skipped, 1);
        assert_eq!(f.engine.get_items(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unconfirmed_instructions_ignored() {
        let f = fixture();
        f.movements.set_actual("T1-pay-USDT", dec!(1));
        let report = f
            .engine
            .reconcile(&settlement(dec!(100), InstructionStatus::Sent))
            .await
            .unwrap();
        assert_eq!(report, ReconcileReport::default());
    }

    #[tokio::test]
    async fn test_update_item_transitions() {
        let f = fixture();
        f.movements.set_actual("T1-pay-USDT", dec!(101));
        f.engine
            .reconcile(&settlement(dec!(100), InstructionStatus::Confirmed))
            .await
            .unwrap();
        let id = f.engine.get_items(None).await.unwrap()[0].id.clone();

        assert!(f
            .engine
            .update_item(
                &id,
                &ReconciliationUpdate::status(ReconciliationStatus::Investigating)
                    .notes("chasing counterparty"),
                "ops"
            )
            .await
            .unwrap());
        assert!(f
            .engine
            .update_item(&id, &ReconciliationUpdate::status(ReconciliationStatus::Resolved), "ops")
            .await
            .unwrap());

        let err = f
            .engine
            .update_item(&id, &ReconciliationUpdate::status(ReconciliationStatus::Unmatched), "ops")
            .await
            .unwrap_err();
        assert!(matches!(err, ReconciliationError::InvalidTransition { .. }));

        assert!(!f
            .engine
            .update_item("rec-missing", &ReconciliationUpdate::default(), "ops")
            .await
            .unwrap());

        let item = f.store.get_item(&id).await.unwrap().unwrap();
        assert_eq!(item.status, ReconciliationStatus::Resolved);
        assert_eq!(item.investigation_notes.as_deref(), Some("chasing counterparty"));
        assert_eq!(f.journal.records().len(), 2);

        let summary = f.engine.summary().await.unwrap();
        assert_eq!(summary.resolved.count, 1);
        assert_eq!(summary.resolved.total_difference, dec!(1));
        assert_eq!(summary.open(), 0);
    }

    #[tokio::test]
    async fn test_update_not_applied_when_journal_fails() {
        let f = fixture();
        f.movements.set_actual("T1-pay-USDT", dec!(101));
        f.engine
            .reconcile(&settlement(dec!(100), InstructionStatus::Confirmed))
            .await
            .unwrap();
        let id = f.engine.get_items(None).await.unwrap()[0].id.clone();

        f.journal.set_unavailable(true);
        let resolve = ReconciliationUpdate::status(ReconciliationStatus::Resolved);
        let err = f.engine.update_item(&id, &resolve, "ops").await.unwrap_err();
        assert!(matches!(err, ReconciliationError::Audit(_)));
        let item = f.store.get_item(&id).await.unwrap().unwrap();
        assert_eq!(item.status, ReconciliationStatus::Unmatched);

        f.journal.set_unavailable(false);
        assert!(f.engine.update_item(&id, &resolve, "ops").await.unwrap());
        assert_eq!(f.journal.records().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_movement_query_does_not_block_resolution() {
        let f = fixture();
        f.movements.set_actual("T1-pay-USDT", dec!(90));
        f.engine
            .reconcile(&settlement(dec!(100), InstructionStatus::Confirmed))
            .await
            .unwrap();
        let id = f.engine.get_items(None).await.unwrap()[0].id.clone();

        f.movements.set_latency(std::time::Duration::from_secs(60));
        let mut slow = settlement(dec!(100), InstructionStatus::Confirmed);
        slow.id = "stl-2".into();
        slow.instructions[0].id = "ins-2".into();

        let start = tokio::time::Instant::now();
        let (report, resolved_after) = tokio::join!(f.engine.reconcile(&slow), async {
            f.engine
                .update_item(
                    &id,
                    &ReconciliationUpdate::status(ReconciliationStatus::Investigating),
                    "ops",
                )
                .await
                .unwrap();
            start.elapsed()
        });

        assert!(resolved_after < std::time::Duration::from_secs(60));
        assert_eq!(report.unwrap().discrepancies.len(), 1);
        assert_eq!(f.engine.get_items(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_sweep_covers_recent_settlements() {
        let f = fixture();
        f.movements.set_actual("T1-pay-USDT", dec!(50));
        f.store
            .insert_settlement(settlement(dec!(100), InstructionStatus::Confirmed))
            .await
            .unwrap();
        let report = f.engine.run_sweep().await.unwrap();
        assert_eq!(report.discrepancies.len(), 1);
        let again = f.engine.run_sweep().await.unwrap();
        assert!(again.discrepancies.is_empty());
    }
}
