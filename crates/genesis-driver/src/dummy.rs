use async_trait::async_trait;
use genesis_domain::{EntityKind, ProjectId};
use genesis_store::{ScanFilter, StoredEntity};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;

use crate::driver::CapabilityDriver;
use crate::error::DriverError;

/// Synthetic compute driver standing in for a real hypervisor backend
/// (libvirt and friends sit behind this interface per the stated non-goal).
/// Directly descended from this workspace's local stub driver: no real I/O,
/// produces a synthetic JSON handle and logs at `debug`.
#[derive(Default)]
pub struct DummyComputeDriver {
    observed: RwLock<Vec<StoredEntity>>,
}

impl DummyComputeDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

const KINDS: &[EntityKind] = &[EntityKind::Node, EntityKind::MachinePool];

#[async_trait]
impl CapabilityDriver for DummyComputeDriver {
    fn supported_kinds(&self) -> &'static [EntityKind] {
        KINDS
    }

    async fn list_actual(&self, project_id: ProjectId, _filter: ScanFilter) -> Result<Vec<StoredEntity>, DriverError> {
        let observed = self.observed.read().await;
        Ok(observed
            .iter()
            .filter(|e| e.envelope.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn create(&self, target: &StoredEntity) -> Result<StoredEntity, DriverError> {
        debug!(id = %target.envelope.id, "dummy compute driver: create");
        let mut actual = target.clone();
        actual.spec = json!({
            "provisioned": true,
            "name": target.spec.get("name").cloned().unwrap_or(json!(null)),
        });
        self.observed.write().await.push(actual.clone());
        Ok(actual)
    }

    async fn update(&self, target: &StoredEntity, prior_actual: &StoredEntity) -> Result<StoredEntity, DriverError> {
        debug!(id = %target.envelope.id, "dummy compute driver: update");
        if self.converges(target, prior_actual) {
            return Ok(prior_actual.clone());
        }
        self.create(target).await
    }

    async fn delete(&self, actual: &StoredEntity) -> Result<(), DriverError> {
        debug!(id = %actual.envelope.id, "dummy compute driver: delete");
        let mut observed = self.observed.write().await;
        observed.retain(|e| e.envelope.id != actual.envelope.id);
        Ok(())
    }

    fn converges(&self, target: &StoredEntity, actual: &StoredEntity) -> bool {
        target.spec.get("name") == actual.spec.get("name")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use genesis_domain::{EntityId, Envelope, Status};

    fn target(project_id: ProjectId) -> StoredEntity {
        let now = Utc::now();
        StoredEntity::new(
            Envelope {
                id: EntityId::new_v4(),
                project_id,
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
    async fn create_returns_provisioned_handle() {
        let driver = DummyComputeDriver::new();
        let project_id = ProjectId::new_v4();
        let actual = driver.create(&target(project_id)).await.unwrap();
        assert_eq!(actual.spec["provisioned"], json!(true));
    }

    #[tokio::test]
    async fn update_is_noop_when_converged() {
        let driver = DummyComputeDriver::new();
        let project_id = ProjectId::new_v4();
        let t = target(project_id);
        let actual = driver.create(&t).await.unwrap();
        let updated = driver.update(&t, &actual).await.unwrap();
        assert_eq!(updated.spec_hash(), actual.spec_hash());
    }

    #[tokio::test]
    async fn delete_removes_from_observed_set() {
        let driver = DummyComputeDriver::new();
        let project_id = ProjectId::new_v4();
        let actual = driver.create(&target(project_id)).await.unwrap();
        driver.delete(&actual).await.unwrap();
        let remaining = driver.list_actual(project_id, ScanFilter::default()).await.unwrap();
        assert!(remaining.is_empty());
    }
}
