use async_trait::async_trait;
use chrono::{DateTime, Utc};
use genesis_domain::{EntityId, EntityKind, ProjectId, Status};

use crate::entity::{OutboxEvent, ScanFilter, StoredEntity};
use crate::error::StoreError;

/// Transactional read/write of resources with optimistic concurrency,
/// generalized from this workspace's kind-parametric entity model: one
/// surface for every [`EntityKind`] rather than one method per concrete
/// type. Schema is declared per kind by the caller and loaded at startup;
/// the store itself is agnostic to it.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get(&self, kind: EntityKind, id: EntityId) -> Result<Option<StoredEntity>, StoreError>;

    async fn list(
        &self,
        kind: EntityKind,
        project_id: Option<ProjectId>,
        filter: ScanFilter,
    ) -> Result<Vec<StoredEntity>, StoreError>;

    /// Compare-and-set on the version field. `expected_version: None` means
    /// unconditional create; `Some(v)` fails with `StoreError::Conflict` if
    /// the stored version does not match `v`.
    async fn upsert_target(
        &self,
        kind: EntityKind,
        entity: StoredEntity,
        expected_version: Option<u64>,
    ) -> Result<StoredEntity, StoreError>;

    /// Actuals are written unconditionally by the agent that observed them —
    /// there is no target-side client racing the write.
    async fn upsert_actual(&self, kind: EntityKind, entity: StoredEntity) -> Result<StoredEntity, StoreError>;

    async fn delete(&self, kind: EntityKind, id: EntityId) -> Result<(), StoreError>;

    /// Targets with no matching actual row yet — drives `create` dispatch.
    async fn scan_targets_without_actual(&self, kind: EntityKind) -> Result<Vec<StoredEntity>, StoreError>;

    /// Actuals whose target has been removed — orphans scheduled for deletion.
    async fn scan_orphan_actuals(&self, kind: EntityKind) -> Result<Vec<StoredEntity>, StoreError>;

    /// Targets in a given status older than a cutoff — drives claim batching
    /// and stale-lease reclaim.
    async fn scan_stale(
        &self,
        kind: EntityKind,
        status_discriminant: StatusDiscriminant,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<StoredEntity>, StoreError>;

    async fn append_event(&self, event: OutboxEvent) -> Result<(), StoreError>;

    async fn drain_outbox(&self, limit: usize) -> Result<Vec<OutboxEvent>, StoreError>;

    async fn dead_letter(&self, event: OutboxEvent) -> Result<(), StoreError>;

    async fn remove_from_outbox(&self, event_id: uuid::Uuid) -> Result<(), StoreError>;
}

/// `Status` carries a `reason` payload on the `Error` variant, which makes it
/// awkward to use directly as a scan key. Callers scanning for "targets in
/// state S" pass this discriminant instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusDiscriminant {
    New,
    InProgress,
    Active,
    Error,
    Deleting,
}

impl StatusDiscriminant {
    pub fn matches(&self, status: &Status) -> bool {
        matches!(
            (self, status),
            (StatusDiscriminant::New, Status::New)
                | (StatusDiscriminant::InProgress, Status::InProgress)
                | (StatusDiscriminant::Active, Status::Active)
                | (StatusDiscriminant::Error, Status::Error { .. })
                | (StatusDiscriminant::Deleting, Status::Deleting)
        )
    }
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}
