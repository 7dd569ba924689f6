//! Engine events for pub/sub distribution

use chrono::{DateTime, Utc};
use riskbank_core::{
    ClientExposure, CreditProfile, ReconciliationItem, RiskAlert, SettlementStatus,
};
use serde::{Deserialize, Serialize};

/// Events emitted by the risk and settlement services
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A position was recorded in the exposure ledger
    ExposureAdded {
        exposure: ClientExposure,
        timestamp: DateTime<Utc>,
    },

    /// A credit profile changed (exposure-driven or admin override)
    ProfileUpdated { profile: CreditProfile },

    /// A limit breach was detected
    RiskAlertRaised { alert: RiskAlert },

    AlertAcknowledged {
        alert_id: String,
        acknowledged_by: String,
        timestamp: DateTime<Utc>,
    },

    SettlementCreated {
        settlement_id: String,
        trade_id: String,
        client_id: String,
    },

    SettlementStatusChanged {
        settlement_id: String,
        from: SettlementStatus,
        to: SettlementStatus,
    },

    InstructionSent {
        settlement_id: String,
        instruction_id: String,
        transfer_ref: String,
    },

    InstructionConfirmed {
        settlement_id: String,
        instruction_id: String,
        confirmations: u32,
    },

    /// An instruction could not be confirmed. The settlement is now
    /// partially settled and needs manual intervention.
    InstructionFailed {
        settlement_id: String,
        instruction_id: String,
        client_id: String,
        reason: String,
    },

    /// Actual movement differs from the expected amount beyond tolerance
    ReconciliationDiscrepancy { item: ReconciliationItem },
}

impl EngineEvent {
    pub fn exposure_added(exposure: ClientExposure) -> Self {
        Self::ExposureAdded {
            exposure,
            timestamp: Utc::now(),
        }
    }

    pub fn alert_acknowledged(alert_id: impl Into<String>, by: impl Into<String>) -> Self {
        Self::AlertAcknowledged {
            alert_id: alert_id.into(),
            acknowledged_by: by.into(),
            timestamp: Utc::now(),
        }
    }

    /// Short event name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::ExposureAdded { .. } => "exposure_added",
            EngineEvent::ProfileUpdated { .. } => "profile_updated",
            EngineEvent::RiskAlertRaised { .. } => "risk_alert",
            EngineEvent::AlertAcknowledged { .. } => "alert_acknowledged",
            EngineEvent::SettlementCreated { .. } => "settlement_created",
            EngineEvent::SettlementStatusChanged { .. } => "settlement_status_changed",
            EngineEvent::InstructionSent { .. } => "instruction_sent",
            EngineEvent::InstructionConfirmed { .. } => "instruction_confirmed",
            EngineEvent::InstructionFailed { .. } => "instruction_failed",
            EngineEvent::ReconciliationDiscrepancy { .. } => "reconciliation_discrepancy",
        }
    }
}
