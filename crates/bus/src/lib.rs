//! RiskBank Event Bus - In-process typed event distribution
//!
//! Fans out engine events (alerts, exposure changes, settlement progress,
//! reconciliation discrepancies) to any number of subscribers.
//!
//! - Bounded tokio broadcast channel: publishing never blocks the engine
//! - Slow subscribers lag and skip events (logged), they never stall producers
//! - `EventSubscriber` trait + `spawn_subscriber` for async handlers
//! - `spawn_periodic` for ticking background loops with an explicit stop

pub mod channel;
pub mod error;
pub mod event;
pub mod schedule;
pub mod subscriber;

pub use channel::EventBus;
pub use error::BusError;
pub use event::EngineEvent;
pub use schedule::{spawn_periodic, PeriodicHandle};
pub use subscriber::{spawn_subscriber, EventSubscriber};
