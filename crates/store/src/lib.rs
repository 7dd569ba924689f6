//! RiskBank Store - repository abstraction
//!
//! Engines talk to storage only through the traits in [`repository`], so a
//! database-backed implementation can replace [`InMemoryStore`] without
//! touching engine logic.

pub mod error;
pub mod locks;
pub mod memory;
pub mod repository;

pub use error::StoreError;
pub use locks::KeyedLocks;
pub use memory::InMemoryStore;
pub use repository::{
    AlertFilter, AlertRepository, ExposureRepository, ProfileRepository,
    ReconciliationRepository, SettlementRepository,
};
