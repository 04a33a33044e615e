use std::sync::Arc;

use genesis_domain::backoff_delay;
use genesis_store::ResourceStore;
use tracing::{error, warn};

use crate::bus::EventBus;
use crate::error::EventError;

/// Drains the outbox and hands each event to every subscriber registered
/// for its kind, retrying a `Transient` subscriber failure with the shared
/// backoff curve and dead-lettering once `max_attempts` is exceeded. A
/// restart just re-drains whatever the store still holds, which is what
/// gives at-least-once delivery across a dispatcher crash.
pub struct Dispatcher {
    store: Arc<dyn ResourceStore>,
    bus: EventBus,
    max_attempts: u32,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn ResourceStore>, bus: EventBus, max_attempts: u32) -> Self {
        Self { store, bus, max_attempts }
    }

    /// Drains up to `limit` outbox events and dispatches each to completion
    /// (success, requeue-for-retry, or dead-letter) before returning. Callers
    /// loop this on an interval; it does not sleep or loop itself.
    pub async fn drain_once(&self, limit: usize) -> Result<(), EventError> {
        let events = self.store.drain_outbox(limit).await?;
        for mut event in events {
            let subscribers = self.bus.subscribers_for(event.kind);
            if subscribers.is_empty() {
                self.store.remove_from_outbox(event.id).await?;
                continue;
            }

            let mut failed = false;
            for subscriber in subscribers {
                if let Err(err) = subscriber.handle(&event).await {
                    if err.is_retryable() {
                        warn!(event_id = %event.id, kind = ?event.kind, attempts = event.attempts, "subscriber transient failure");
                        failed = true;
                        break;
                    } else {
                        error!(event_id = %event.id, kind = ?event.kind, "subscriber permanent failure — dead-lettering");
                        self.store.dead_letter(event.clone()).await?;
                        failed = true;
                        break;
                    }
                }
            }

            if !failed {
                self.store.remove_from_outbox(event.id).await?;
                continue;
            }

            event.attempts += 1;
            if event.attempts >= self.max_attempts {
                error!(event_id = %event.id, kind = ?event.kind, attempts = event.attempts, "max attempts exceeded — dead-lettering");
                self.store.dead_letter(event.clone()).await?;
            } else {
                // `drain_outbox` only peeks — the original, not-yet-incremented
                // copy of this event is still sitting in the outbox. Remove it
                // before appending the requeued copy, or every retried event
                // duplicates on each tick.
                self.store.remove_from_outbox(event.id).await?;
                let delay = backoff_delay(event.attempts);
                tokio::time::sleep(delay).await;
                self.store.append_event(event).await?;
            }
        }
        Ok(())
    }
}
