use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use genesis_store::{EventKind, OutboxEvent};

use crate::error::EventError;

/// A registered handler for one or more [`EventKind`]s. Generalizes this
/// codebase's payload-handler pattern: handlers never see the outbox
/// machinery, only the event they were registered for.
#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn handle(&self, event: &OutboxEvent) -> Result<(), EventError>;
}

/// Registry of subscribers keyed by the event kind they were registered
/// against. The bus itself holds no durability — `ResourceStore` owns the
/// outbox; this is purely in-process fan-out bookkeeping for the
/// [`crate::dispatcher::Dispatcher`].
#[derive(Default)]
pub struct EventBus {
    subscribers: HashMap<EventKind, Vec<Arc<dyn Subscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self { subscribers: HashMap::new() }
    }

    pub fn subscribe(&mut self, kind: EventKind, subscriber: Arc<dyn Subscriber>) -> &mut Self {
        self.subscribers.entry(kind).or_default().push(subscriber);
        self
    }

    pub fn subscribers_for(&self, kind: EventKind) -> &[Arc<dyn Subscriber>] {
        self.subscribers.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }
}
