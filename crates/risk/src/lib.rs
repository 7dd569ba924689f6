//! RiskBank Credit Risk
//!
//! Tracks client exposure, keeps credit profiles in step with it, scores
//! risk and raises alerts when limits are crossed. Breaches never block
//! the operation that caused them; they only produce alerts.
//!
//! ```text
//! add_exposure ──► ExposureLedger ──► CreditProfileStore ──► RiskMonitor ──► alerts
//!                                                                ▲
//!                                           periodic tick ───────┘
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod exposure;
pub mod monitor;
pub mod profile;
pub mod scoring;

pub use config::RiskConfig;
pub use engine::{CreditRiskEngine, RiskOutcome};
pub use error::RiskError;
pub use exposure::{ExposureLedger, ExposureTotals};
pub use monitor::{AlertCounts, MonitorHandle, PortfolioRisk, RiskDistribution, RiskMonitor};
pub use profile::CreditProfileStore;
pub use scoring::{RiskScorer, RiskSnapshot, ScoreBreakdown};
