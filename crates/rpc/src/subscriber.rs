//! Structured event log for the running service

use async_trait::async_trait;
use riskbank_bus::{BusError, EngineEvent, EventSubscriber};

/// Writes every engine event to the tracing log at a level matching
/// its urgency
pub struct EventLogger;

#[async_trait]
impl EventSubscriber for EventLogger {
    fn name(&self) -> &str {
        "event-logger"
    }

    async fn handle(&self, event: &EngineEvent) -> Result<(), BusError> {
        match event {
            EngineEvent::RiskAlertRaised { alert } => tracing::warn!(
                client = %alert.client_id,
                alert_type = %alert.alert_type,
                severity = %alert.severity,
                "{}",
                alert.message
            ),
            EngineEvent::InstructionFailed {
                settlement_id,
                instruction_id,
                reason,
                ..
            } => tracing::error!(
                settlement = %settlement_id,
                instruction = %instruction_id,
                %reason,
                "Instruction failed"
            ),
            EngineEvent::ReconciliationDiscrepancy { item } => tracing::warn!(
                item = %item.id,
                reference = %item.reference,
                difference = %item.difference,
                "Reconciliation discrepancy"
            ),
            EngineEvent::SettlementStatusChanged {
                settlement_id,
                from,
                to,
            } => tracing::info!(settlement = %settlement_id, %from, %to, "Settlement status changed"),
            other => tracing::debug!(event = other.kind(), "Engine event"),
        }
        Ok(())
    }
}
