use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use genesis_domain::{EntityId, EntityKind, ProjectId};
use redb::{Database, ReadableTable, TableDefinition};
use uuid::Uuid;

use crate::entity::{OutboxEvent, ScanFilter, StoredEntity};
use crate::error::StoreError;
use crate::store::{ResourceStore, StatusDiscriminant};

const TARGETS: TableDefinition<&str, &[u8]> = TableDefinition::new("targets");
const ACTUALS: TableDefinition<&str, &[u8]> = TableDefinition::new("actuals");
const OUTBOX: TableDefinition<u64, &[u8]> = TableDefinition::new("outbox");
const DEAD_LETTERS: TableDefinition<u64, &[u8]> = TableDefinition::new("dead_letters");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

fn target_key(kind: EntityKind, id: EntityId) -> String {
    format!("{kind:?}/{id}")
}

/// Embedded `redb` backend, directly descended from this codebase's
/// `RedbStore`: one table per concern (targets, actuals, outbox,
/// dead-letters) plus a meta table holding the outbox sequence counter,
/// generalized from per-kind tables to a single table keyed by
/// `"{kind}/{id}"` since the kind enumeration is now data, not a set of
/// hand-written table definitions.
pub struct RedbResourceStore {
    db: Arc<Database>,
}

impl RedbResourceStore {
    pub fn open(path: &std::path::Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Internal(e.to_string()))?;
        }
        let db = Database::create(path).map_err(|e| StoreError::Internal(e.to_string()))?;
        {
            let txn = db.begin_write().map_err(|e| StoreError::Internal(e.to_string()))?;
            {
                txn.open_table(TARGETS).map_err(|e| StoreError::Internal(e.to_string()))?;
                txn.open_table(ACTUALS).map_err(|e| StoreError::Internal(e.to_string()))?;
                txn.open_table(OUTBOX).map_err(|e| StoreError::Internal(e.to_string()))?;
                txn.open_table(DEAD_LETTERS).map_err(|e| StoreError::Internal(e.to_string()))?;
                txn.open_table(META).map_err(|e| StoreError::Internal(e.to_string()))?;
            }
            txn.commit().map_err(|e| StoreError::Internal(e.to_string()))?;
        }
        Ok(Self { db: Arc::new(db) })
    }

    fn next_outbox_seq(&self) -> Result<u64, StoreError> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Internal(e.to_string()))?;
        let next = {
            let mut meta = txn.open_table(META).map_err(|e| StoreError::Internal(e.to_string()))?;
            let current = meta
                .get("outbox_seq")
                .map_err(|e| StoreError::Internal(e.to_string()))?
                .map(|v| v.value())
                .unwrap_or(0);
            let next = current + 1;
            meta.insert("outbox_seq", next).map_err(|e| StoreError::Internal(e.to_string()))?;
            next
        };
        txn.commit().map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(next)
    }
}

#[async_trait]
impl ResourceStore for RedbResourceStore {
    async fn get(&self, kind: EntityKind, id: EntityId) -> Result<Option<StoredEntity>, StoreError> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Internal(e.to_string()))?;
        let table = txn.open_table(TARGETS).map_err(|e| StoreError::Internal(e.to_string()))?;
        let key = target_key(kind, id);
        match table.get(key.as_str()).map_err(|e| StoreError::Internal(e.to_string()))? {
            Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
            None => Ok(None),
        }
    }

    async fn list(
        &self,
        kind: EntityKind,
        project_id: Option<ProjectId>,
        _filter: ScanFilter,
    ) -> Result<Vec<StoredEntity>, StoreError> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Internal(e.to_string()))?;
        let table = txn.open_table(TARGETS).map_err(|e| StoreError::Internal(e.to_string()))?;
        let prefix = format!("{kind:?}/");
        let mut out = Vec::new();
        for row in table.iter().map_err(|e| StoreError::Internal(e.to_string()))? {
            let (k, v) = row.map_err(|e| StoreError::Internal(e.to_string()))?;
            if !k.value().starts_with(&prefix) {
                continue;
            }
            let entity: StoredEntity = serde_json::from_slice(v.value())?;
            if project_id.map(|p| entity.envelope.project_id == p).unwrap_or(true) {
                out.push(entity);
            }
        }
        Ok(out)
    }

    async fn upsert_target(
        &self,
        kind: EntityKind,
        entity: StoredEntity,
        expected_version: Option<u64>,
    ) -> Result<StoredEntity, StoreError> {
        let key = target_key(kind, entity.envelope.id);
        let txn = self.db.begin_write().map_err(|e| StoreError::Internal(e.to_string()))?;
        {
            let mut table = txn.open_table(TARGETS).map_err(|e| StoreError::Internal(e.to_string()))?;
            if let Some(expected) = expected_version {
                let existing: Option<StoredEntity> = table
                    .get(key.as_str())
                    .map_err(|e| StoreError::Internal(e.to_string()))?
                    .map(|v| serde_json::from_slice(v.value()))
                    .transpose()?;
                match existing {
                    Some(e) if e.envelope.version != expected => {
                        return Err(StoreError::Conflict { expected, actual: e.envelope.version });
                    }
                    None => return Err(StoreError::Conflict { expected, actual: 0 }),
                    _ => {}
                }
            }
            let bytes = serde_json::to_vec(&entity)?;
            table.insert(key.as_str(), bytes.as_slice()).map_err(|e| StoreError::Internal(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(entity)
    }

    async fn upsert_actual(&self, kind: EntityKind, entity: StoredEntity) -> Result<StoredEntity, StoreError> {
        let key = target_key(kind, entity.envelope.id);
        let txn = self.db.begin_write().map_err(|e| StoreError::Internal(e.to_string()))?;
        {
            let mut table = txn.open_table(ACTUALS).map_err(|e| StoreError::Internal(e.to_string()))?;
            let bytes = serde_json::to_vec(&entity)?;
            table.insert(key.as_str(), bytes.as_slice()).map_err(|e| StoreError::Internal(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(entity)
    }

    async fn delete(&self, kind: EntityKind, id: EntityId) -> Result<(), StoreError> {
        let key = target_key(kind, id);
        let txn = self.db.begin_write().map_err(|e| StoreError::Internal(e.to_string()))?;
        {
            let mut targets = txn.open_table(TARGETS).map_err(|e| StoreError::Internal(e.to_string()))?;
            targets.remove(key.as_str()).map_err(|e| StoreError::Internal(e.to_string()))?;
            let mut actuals = txn.open_table(ACTUALS).map_err(|e| StoreError::Internal(e.to_string()))?;
            actuals.remove(key.as_str()).map_err(|e| StoreError::Internal(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn scan_targets_without_actual(&self, kind: EntityKind) -> Result<Vec<StoredEntity>, StoreError> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Internal(e.to_string()))?;
        let targets = txn.open_table(TARGETS).map_err(|e| StoreError::Internal(e.to_string()))?;
        let actuals = txn.open_table(ACTUALS).map_err(|e| StoreError::Internal(e.to_string()))?;
        let prefix = format!("{kind:?}/");
        let mut out = Vec::new();
        for row in targets.iter().map_err(|e| StoreError::Internal(e.to_string()))? {
            let (k, v) = row.map_err(|e| StoreError::Internal(e.to_string()))?;
            if !k.value().starts_with(&prefix) {
                continue;
            }
            if actuals.get(k.value()).map_err(|e| StoreError::Internal(e.to_string()))?.is_none() {
                out.push(serde_json::from_slice(v.value())?);
            }
        }
        Ok(out)
    }

    async fn scan_orphan_actuals(&self, kind: EntityKind) -> Result<Vec<StoredEntity>, StoreError> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Internal(e.to_string()))?;
        let targets = txn.open_table(TARGETS).map_err(|e| StoreError::Internal(e.to_string()))?;
        let actuals = txn.open_table(ACTUALS).map_err(|e| StoreError::Internal(e.to_string()))?;
        let prefix = format!("{kind:?}/");
        let mut out = Vec::new();
        for row in actuals.iter().map_err(|e| StoreError::Internal(e.to_string()))? {
            let (k, v) = row.map_err(|e| StoreError::Internal(e.to_string()))?;
            if !k.value().starts_with(&prefix) {
                continue;
            }
            if targets.get(k.value()).map_err(|e| StoreError::Internal(e.to_string()))?.is_none() {
                out.push(serde_json::from_slice(v.value())?);
            }
        }
        Ok(out)
    }

    async fn scan_stale(
        &self,
        kind: EntityKind,
        status_discriminant: StatusDiscriminant,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<StoredEntity>, StoreError> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Internal(e.to_string()))?;
        let targets = txn.open_table(TARGETS).map_err(|e| StoreError::Internal(e.to_string()))?;
        let prefix = format!("{kind:?}/");
        let mut out = Vec::new();
        for row in targets.iter().map_err(|e| StoreError::Internal(e.to_string()))? {
            let (k, v) = row.map_err(|e| StoreError::Internal(e.to_string()))?;
            if !k.value().starts_with(&prefix) {
                continue;
            }
            let entity: StoredEntity = serde_json::from_slice(v.value())?;
            if status_discriminant.matches(&entity.envelope.status) && entity.envelope.updated_at < older_than {
                out.push(entity);
            }
        }
        Ok(out)
    }

    async fn append_event(&self, event: OutboxEvent) -> Result<(), StoreError> {
        let seq = self.next_outbox_seq()?;
        let txn = self.db.begin_write().map_err(|e| StoreError::Internal(e.to_string()))?;
        {
            let mut table = txn.open_table(OUTBOX).map_err(|e| StoreError::Internal(e.to_string()))?;
            let bytes = serde_json::to_vec(&event)?;
            table.insert(seq, bytes.as_slice()).map_err(|e| StoreError::Internal(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn drain_outbox(&self, limit: usize) -> Result<Vec<OutboxEvent>, StoreError> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Internal(e.to_string()))?;
        let table = txn.open_table(OUTBOX).map_err(|e| StoreError::Internal(e.to_string()))?;
        let mut out = Vec::new();
        for row in table.iter().map_err(|e| StoreError::Internal(e.to_string()))?.take(limit) {
            let (_, v) = row.map_err(|e| StoreError::Internal(e.to_string()))?;
            out.push(serde_json::from_slice(v.value())?);
        }
        Ok(out)
    }

    async fn dead_letter(&self, event: OutboxEvent) -> Result<(), StoreError> {
        let seq = self.next_outbox_seq()?;
        let txn = self.db.begin_write().map_err(|e| StoreError::Internal(e.to_string()))?;
        {
            let mut dead = txn.open_table(DEAD_LETTERS).map_err(|e| StoreError::Internal(e.to_string()))?;
            let bytes = serde_json::to_vec(&event)?;
            dead.insert(seq, bytes.as_slice()).map_err(|e| StoreError::Internal(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Internal(e.to_string()))?;
        self.remove_from_outbox(event.id).await
    }

    async fn remove_from_outbox(&self, event_id: Uuid) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Internal(e.to_string()))?;
        let mut to_remove = Vec::new();
        {
            let table = txn.open_table(OUTBOX).map_err(|e| StoreError::Internal(e.to_string()))?;
            for row in table.iter().map_err(|e| StoreError::Internal(e.to_string()))? {
                let (k, v) = row.map_err(|e| StoreError::Internal(e.to_string()))?;
                let event: OutboxEvent = serde_json::from_slice(v.value())?;
                if event.id == event_id {
                    to_remove.push(k.value());
                }
            }
        }
        {
            let mut table = txn.open_table(OUTBOX).map_err(|e| StoreError::Internal(e.to_string()))?;
            for key in to_remove {
                table.remove(key).map_err(|e| StoreError::Internal(e.to_string()))?;
            }
        }
        txn.commit().map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use genesis_domain::{Envelope, ProjectId, Status};
    use serde_json::json;
    use tempfile::tempdir;

    fn entity() -> StoredEntity {
        let now = Utc::now();
        StoredEntity::new(
            Envelope {
                id: EntityId::new_v4(),
                project_id: ProjectId::new_v4(),
                created_at: now,
                updated_at: now,
                version: 1,
                status: Status::New,
                claimed_until: None,
                attempt_count: 0,
            },
            json!({"name": "n1"}),
        )
    }

    #[tokio::test]
    async fn upsert_and_get() {
        let dir = tempdir().unwrap();
        let store = RedbResourceStore::open(&dir.path().join("store.redb")).unwrap();
        let e = entity();
        let id = e.envelope.id;
        store.upsert_target(EntityKind::Node, e, None).await.unwrap();
        let fetched = store.get(EntityKind::Node, id).await.unwrap().unwrap();
        assert_eq!(fetched.envelope.id, id);
    }

    #[tokio::test]
    async fn persistence_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.redb");
        let e = entity();
        let id = e.envelope.id;
        {
            let store = RedbResourceStore::open(&path).unwrap();
            store.upsert_target(EntityKind::Node, e, None).await.unwrap();
        }
        let store = RedbResourceStore::open(&path).unwrap();
        let fetched = store.get(EntityKind::Node, id).await.unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn cas_conflict_on_stale_version() {
        let dir = tempdir().unwrap();
        let store = RedbResourceStore::open(&dir.path().join("store.redb")).unwrap();
        let e = entity();
        store.upsert_target(EntityKind::Node, e.clone(), None).await.unwrap();
        let err = store.upsert_target(EntityKind::Node, e, Some(42)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { expected: 42, .. }));
    }
}
