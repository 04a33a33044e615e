use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use genesis_domain::{EntityId, EntityKind, ProjectId};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::entity::{OutboxEvent, ScanFilter, StoredEntity};
use crate::error::StoreError;
use crate::store::{ResourceStore, StatusDiscriminant};

#[derive(Default)]
struct Inner {
    targets: HashMap<(EntityKind, EntityId), StoredEntity>,
    actuals: HashMap<(EntityKind, EntityId), StoredEntity>,
    outbox: Vec<OutboxEvent>,
    dead_letters: Vec<OutboxEvent>,
}

/// `RwLock`-guarded in-memory store, the test double every other crate's
/// unit tests run against. Directly descended from this codebase's
/// `InMemoryStore`, generalized from one hand-enumerated map per entity
/// kind to a single kind-parametric map keyed by `(EntityKind, EntityId)`.
pub struct InMemoryResourceStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryResourceStore {
    pub fn new() -> Self {
        Self { inner: Arc::new(RwLock::new(Inner::default())) }
    }
}

impl Default for InMemoryResourceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceStore for InMemoryResourceStore {
    async fn get(&self, kind: EntityKind, id: EntityId) -> Result<Option<StoredEntity>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.targets.get(&(kind, id)).cloned())
    }

    async fn list(
        &self,
        kind: EntityKind,
        project_id: Option<ProjectId>,
        _filter: ScanFilter,
    ) -> Result<Vec<StoredEntity>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .targets
            .iter()
            .filter(|((k, _), entity)| {
                *k == kind && project_id.map(|p| entity.envelope.project_id == p).unwrap_or(true)
            })
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn upsert_target(
        &self,
        kind: EntityKind,
        entity: StoredEntity,
        expected_version: Option<u64>,
    ) -> Result<StoredEntity, StoreError> {
        let mut inner = self.inner.write().await;
        let key = (kind, entity.envelope.id);
        if let Some(expected) = expected_version {
            match inner.targets.get(&key) {
                Some(existing) if existing.envelope.version != expected => {
                    return Err(StoreError::Conflict { expected, actual: existing.envelope.version });
                }
                None => {
                    return Err(StoreError::Conflict { expected, actual: 0 });
                }
                _ => {}
            }
        }
        inner.targets.insert(key, entity.clone());
        Ok(entity)
    }

    async fn upsert_actual(&self, kind: EntityKind, entity: StoredEntity) -> Result<StoredEntity, StoreError> {
        let mut inner = self.inner.write().await;
        inner.actuals.insert((kind, entity.envelope.id), entity.clone());
        Ok(entity)
    }

    async fn delete(&self, kind: EntityKind, id: EntityId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.targets.remove(&(kind, id));
        inner.actuals.remove(&(kind, id));
        Ok(())
    }

    async fn scan_targets_without_actual(&self, kind: EntityKind) -> Result<Vec<StoredEntity>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .targets
            .iter()
            .filter(|((k, id), _)| *k == kind && !inner.actuals.contains_key(&(kind, *id)))
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn scan_orphan_actuals(&self, kind: EntityKind) -> Result<Vec<StoredEntity>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .actuals
            .iter()
            .filter(|((k, id), _)| *k == kind && !inner.targets.contains_key(&(kind, *id)))
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn scan_stale(
        &self,
        kind: EntityKind,
        status_discriminant: StatusDiscriminant,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<StoredEntity>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .targets
            .iter()
            .filter(|((k, _), entity)| {
                *k == kind
                    && status_discriminant.matches(&entity.envelope.status)
                    && entity.envelope.updated_at < older_than
            })
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn append_event(&self, event: OutboxEvent) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.outbox.push(event);
        Ok(())
    }

    async fn drain_outbox(&self, limit: usize) -> Result<Vec<OutboxEvent>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.outbox.iter().take(limit).cloned().collect())
    }

    async fn dead_letter(&self, event: OutboxEvent) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.outbox.retain(|e| e.id != event.id);
        inner.dead_letters.push(event);
        Ok(())
    }

    async fn remove_from_outbox(&self, event_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.outbox.retain(|e| e.id != event_id);
        Ok(())
    }
}
