use async_trait::async_trait;
use genesis_domain::{EntityKind, ProjectId};
use genesis_store::{ScanFilter, StoredEntity};

use crate::error::DriverError;

/// A capability driver handles exactly one resource kind. Generalized from
/// this workspace's cloud-keyed driver trait to the kind-keyed contract this
/// specification calls for: `create`/`update`/`delete` are idempotent on
/// identifier, and `list_actual` must be safe to call concurrently with the
/// mutating methods.
#[async_trait]
pub trait CapabilityDriver: Send + Sync {
    /// Advertised on agent registration.
    fn supported_kinds(&self) -> &'static [EntityKind];

    /// What exists locally right now.
    async fn list_actual(
        &self,
        project_id: ProjectId,
        filter: ScanFilter,
    ) -> Result<Vec<StoredEntity>, DriverError>;

    /// Idempotent on identifier; returns the new actual.
    async fn create(&self, target: &StoredEntity) -> Result<StoredEntity, DriverError>;

    /// Idempotent; may be a no-op if fields already converge.
    async fn update(&self, target: &StoredEntity, prior_actual: &StoredEntity) -> Result<StoredEntity, DriverError>;

    /// Idempotent; success if the resource is already gone.
    async fn delete(&self, actual: &StoredEntity) -> Result<(), DriverError>;

    /// Whether `actual` already reflects `target`, by the driver's own
    /// notion of convergence. A driver's observed actual carries fields
    /// (generated material, provisioning markers, timestamps) the target
    /// spec never had, so callers must not compare `target` and `actual`
    /// for raw content equality — only the driver that produced `actual`
    /// knows which of its fields are driver-added and which must match the
    /// target for the resource to be considered converged.
    fn converges(&self, target: &StoredEntity, actual: &StoredEntity) -> bool;
}
