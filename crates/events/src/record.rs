//! Audit record definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operator action captured in the audit journal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AuditAction {
    AlertAcknowledged {
        alert_id: String,
        client_id: String,
    },
    ProfileOverride {
        client_id: String,
        fields: Vec<String>,
    },
    ReconciliationUpdated {
        item_id: String,
        from_status: String,
        to_status: String,
    },
    SettlementCancelled {
        settlement_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    #[serde(flatten)]
    pub action: AuditAction,
}

impl AuditRecord {
    pub fn new(actor: impl Into<String>, action: AuditAction) -> Self {
        Self {
            timestamp: Utc::now(),
            actor: actor.into(),
            action,
        }
    }
}
