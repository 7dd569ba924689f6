//! RiskBank RPC - application context, admin API and CLI
//!
//! Wires the risk engine, settlement orchestrator and reconciliation
//! engine onto one store, event bus and audit journal, and exposes the
//! read/write operations an admin surface needs.

pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod feed;
pub mod subscriber;

pub use config::AppConfig;
pub use context::{AppContext, BackgroundTasks, MockHandles};
pub use error::ApiError;
pub use feed::{apply_record, parse_feed, read_feed, FeedOutcome, FeedRecord};
pub use subscriber::EventLogger;
