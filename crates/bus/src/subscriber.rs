//! Event subscriber trait for async event handling

use async_trait::async_trait;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::channel::EventBus;
use crate::error::BusError;
use crate::event::EngineEvent;

/// Trait for event subscribers
///
/// Handlers must tolerate missed events: a lagging subscriber skips
/// ahead rather than blocking publishers.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    fn name(&self) -> &str;

    async fn handle(&self, event: &EngineEvent) -> Result<(), BusError>;
}

/// Run `subscriber` against every event published on `bus` until the bus
/// is dropped or the returned task is aborted.
pub fn spawn_subscriber<S>(bus: &EventBus, subscriber: S) -> JoinHandle<()>
where
    S: EventSubscriber + 'static,
{
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Err(e) = subscriber.handle(&event).await {
                        tracing::error!(
                            subscriber = subscriber.name(),
                            event = event.kind(),
                            error = %e,
                            "Subscriber failed"
                        );
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        subscriber = subscriber.name(),
                        skipped,
                        "Subscriber lagged, events skipped"
                    );
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::debug!(subscriber = subscriber.name(), "Subscriber stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    struct Recorder {
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl EventSubscriber for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn handle(&self, event: &EngineEvent) -> Result<(), BusError> {
            self.seen.lock().await.push(event.kind());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_subscriber_receives_and_stops_on_close() {
        let bus = EventBus::new(16);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handle = spawn_subscriber(&bus, Recorder { seen: seen.clone() });

        bus.publish(EngineEvent::alert_acknowledged("a1", "ops"));
        drop(bus);

        handle.await.unwrap();
        assert_eq!(*seen.lock().await, vec!["alert_acknowledged"]);
    }

    struct FailsOnAlert {
        handled: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl EventSubscriber for FailsOnAlert {
        fn name(&self) -> &str {
            "fails-on-alert"
        }

        async fn handle(&self, event: &EngineEvent) -> Result<(), BusError> {
            *self.handled.lock().await += 1;
            if event.kind() == "alert_acknowledged" {
                return Err(BusError::SubscriberFailed {
                    name: self.name().to_string(),
                    reason: "downstream unavailable".into(),
                });
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failed_handler_keeps_subscriber_running() {
        let bus = EventBus::new(16);
        let handled = Arc::new(Mutex::new(0));
        let handle = spawn_subscriber(&bus, FailsOnAlert { handled: handled.clone() });

        bus.publish(EngineEvent::alert_acknowledged("a1", "ops"));
        bus.publish(EngineEvent::alert_acknowledged("a2", "ops"));
        drop(bus);

        handle.await.unwrap();
        assert_eq!(*handled.lock().await, 2);
    }
}
