use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use genesis_domain::EntityId;

/// The "small per-identifier mutex table" the specification calls for:
/// serializes operations on the same identifier across concurrently
/// reconciled kinds without pulling in `DashMap`. Entries are pruned
/// opportunistically when a lock's only remaining reference is the one
/// held by this table itself.
#[derive(Default, Clone)]
pub struct IdentifierLocks {
    inner: Arc<Mutex<HashMap<EntityId, Arc<tokio::sync::Mutex<()>>>>>,
}

impl IdentifierLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_for(&self, id: EntityId) -> Arc<tokio::sync::Mutex<()>> {
        let mut table = self.inner.lock().expect("identifier lock table poisoned");
        table.retain(|_, lock| Arc::strong_count(lock) > 1);
        table.entry(id).or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))).clone()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("identifier lock table poisoned").len()
    }
}
