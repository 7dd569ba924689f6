//! Reconciliation exceptions
//!
//! Only mismatches are recorded; a matched instruction leaves no trace.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::asset::Asset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReconciliationType {
    Trade,
    Settlement,
    Movement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ReconciliationStatus {
    Matched,
    Unmatched,
    Investigating,
    Resolved,
}

impl ReconciliationStatus {
    /// Allowed manual resolution steps. Same-status updates (notes only)
    /// are always allowed.
    pub fn can_transition_to(self, next: ReconciliationStatus) -> bool {
        use ReconciliationStatus::*;
        self == next
            || matches!(
                (self, next),
                (Unmatched, Investigating) | (Unmatched, Resolved) | (Investigating, Resolved)
            )
    }

    pub fn is_open(self) -> bool {
        matches!(
            self,
            ReconciliationStatus::Unmatched | ReconciliationStatus::Investigating
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationItem {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: ReconciliationType,
    /// Instruction id the discrepancy belongs to
    pub reference: String,
    pub settlement_id: Option<String>,
    pub expected_amount: Decimal,
    pub actual_amount: Decimal,
    /// actual - expected
    pub difference: Decimal,
    pub asset: Asset,
    pub status: ReconciliationStatus,
    pub created_at: DateTime<Utc>,
    pub investigation_notes: Option<String>,
}

impl ReconciliationItem {
    pub fn unmatched(
        item_type: ReconciliationType,
        reference: impl Into<String>,
        settlement_id: Option<String>,
        asset: Asset,
        expected: Decimal,
        actual: Decimal,
    ) -> Self {
        Self {
            id: crate::new_id("rec"),
            item_type,
            reference: reference.into(),
            settlement_id,
            expected_amount: expected,
            actual_amount: actual,
            difference: actual - expected,
            asset,
            status: ReconciliationStatus::Unmatched,
            created_at: Utc::now(),
            investigation_notes: None,
        }
    }
}
