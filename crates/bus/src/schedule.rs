//! Periodic background tasks with an explicit stop
//!
//! The first tick fires one full period after start, not immediately.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Handle to a running periodic task
pub struct PeriodicHandle {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PeriodicHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the loop and wait for the in-flight tick to finish
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(task = self.name, error = %e, "Periodic task panicked");
        }
    }
}

/// Run `tick` every `period` until the returned handle is stopped.
///
/// A tick is never interrupted; a stop request is observed between ticks.
pub fn spawn_periodic<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> PeriodicHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let (shutdown, mut stop_rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(task = name, period_secs = period.as_secs(), "Periodic task started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    tracing::debug!(task = name, "Tick");
                    tick().await;
                }
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!(task = name, "Periodic task stopped");
    });

    PeriodicHandle {
        name,
        shutdown,
        task,
    }
}
