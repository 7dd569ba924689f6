//! RiskBank Events - audit journal
//!
//! Records who did what and when for operator actions that mutate engine
//! state outside the automatic flows (alert acknowledgement, profile
//! overrides, reconciliation resolution, settlement cancellation).
//! The JSONL journal is append-only, one file per UTC day.

pub mod error;
pub mod reader;
pub mod record;
pub mod store;

pub use error::EventError;
pub use reader::JournalReader;
pub use record::{AuditAction, AuditRecord};
pub use store::{AuditSink, JsonlJournal, MemoryJournal};
