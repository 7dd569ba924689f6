//! RiskBank Settlement & Reconciliation
//!
//! ```text
//! trade ──► create ──► pending ──process──► processing ──all confirmed──► settled
//!              │                              │    │
//!              └──cancel──► cancelled          │    └─dispatch error──► failed
//!                                             ▼
//!                              per-instruction tracker (poll / delayed check)
//!                                             │
//!                                    confirmed ──► reconcile
//! ```
//!
//! Movers, confirmation sources and movement queries are pluggable; see
//! [`collaborators`] and the [`mock`] implementations.

pub mod calendar;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod instruction;
pub mod mock;
pub mod orchestrator;
pub mod reconciliation;

pub use collaborators::{AssetMover, BankTransferStatus, ConfirmationSource, MovementQuery};
pub use config::{BankDetails, ReconciliationConfig, SettlementConfig};
pub use error::{CollaboratorError, ReconciliationError, SettlementError};
pub use instruction::InstructionPlanner;
pub use mock::{MockConfirmationSource, MockMover, MockMovementQuery};
pub use orchestrator::{Collaborators, SettlementOrchestrator, TradeData};
pub use reconciliation::{
    ReconcileReport, ReconciliationEngine, ReconciliationSummary, ReconciliationUpdate,
    StatusTotals,
};
