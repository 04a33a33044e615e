use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use genesis_domain::{EntityKind, ProjectId};
use genesis_store::{ScanFilter, StoredEntity};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::json;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::debug;

use crate::driver::CapabilityDriver;
use crate::error::DriverError;

/// Generates and rotates password secret material locally. Same
/// idempotent-on-identifier contract as [`crate::dummy::DummyComputeDriver`];
/// no external secret store is wired in, per the workspace's no-fabricated-
/// dependency rule — rotation/generation is synthetic but the lifecycle
/// contract it exercises (create/update/delete, `Transient`/`Permanent`
/// failure shape) is real.
#[derive(Default)]
pub struct PasswordDriver {
    observed: RwLock<Vec<StoredEntity>>,
}

impl PasswordDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

const PASSWORD_KINDS: &[EntityKind] = &[EntityKind::Password];

#[async_trait]
impl CapabilityDriver for PasswordDriver {
    fn supported_kinds(&self) -> &'static [EntityKind] {
        PASSWORD_KINDS
    }

    async fn list_actual(&self, project_id: ProjectId, _filter: ScanFilter) -> Result<Vec<StoredEntity>, DriverError> {
        let observed = self.observed.read().await;
        Ok(observed.iter().filter(|e| e.envelope.project_id == project_id).cloned().collect())
    }

    async fn create(&self, target: &StoredEntity) -> Result<StoredEntity, DriverError> {
        let length = target.spec.get("length").and_then(|v| v.as_u64()).unwrap_or(32) as usize;
        if length == 0 || length > 512 {
            return Err(DriverError::InvalidInput(format!("password length {length} out of range")));
        }
        debug!(id = %target.envelope.id, length, "password driver: create");
        let material: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(length)
            .map(char::from)
            .collect();
        let mut actual = target.clone();
        actual.spec = json!({
            "owner_ref": target.spec.get("owner_ref").cloned().unwrap_or(json!(null)),
            "length": length,
            "material": material,
            "rotated_at": Utc::now().to_rfc3339(),
        });
        self.observed.write().await.push(actual.clone());
        Ok(actual)
    }

    async fn update(&self, target: &StoredEntity, prior_actual: &StoredEntity) -> Result<StoredEntity, DriverError> {
        debug!(id = %target.envelope.id, "password driver: update (rotate)");
        if self.converges(target, prior_actual) {
            return Ok(prior_actual.clone());
        }
        self.delete_by_id(target.envelope.id).await;
        self.create(target).await
    }

    async fn delete(&self, actual: &StoredEntity) -> Result<(), DriverError> {
        debug!(id = %actual.envelope.id, "password driver: delete");
        self.delete_by_id(actual.envelope.id).await;
        Ok(())
    }

    fn converges(&self, target: &StoredEntity, actual: &StoredEntity) -> bool {
        target.spec.get("length") == actual.spec.get("length") && target.spec.get("owner_ref") == actual.spec.get("owner_ref")
    }
}

impl PasswordDriver {
    async fn delete_by_id(&self, id: genesis_domain::EntityId) {
        let mut observed = self.observed.write().await;
        observed.retain(|e| e.envelope.id != id);
    }
}

/// Issues certificates locally as synthetic fingerprinted records — a
/// stand-in for a real CA/ACME integration, which is out of scope.
#[derive(Default)]
pub struct CertificateDriver {
    observed: RwLock<Vec<StoredEntity>>,
}

impl CertificateDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

const CERT_KINDS: &[EntityKind] = &[EntityKind::Certificate];

#[async_trait]
impl CapabilityDriver for CertificateDriver {
    fn supported_kinds(&self) -> &'static [EntityKind] {
        CERT_KINDS
    }

    async fn list_actual(&self, project_id: ProjectId, _filter: ScanFilter) -> Result<Vec<StoredEntity>, DriverError> {
        let observed = self.observed.read().await;
        Ok(observed.iter().filter(|e| e.envelope.project_id == project_id).cloned().collect())
    }

    async fn create(&self, target: &StoredEntity) -> Result<StoredEntity, DriverError> {
        let common_name = target
            .spec
            .get("common_name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| DriverError::InvalidInput("certificate target missing common_name".into()))?;
        let validity_days = target.spec.get("validity_days").and_then(|v| v.as_u64()).unwrap_or(90);
        debug!(id = %target.envelope.id, common_name, "certificate driver: issue");

        let mut hasher = Sha256::new();
        hasher.update(common_name.as_bytes());
        hasher.update(target.envelope.id.to_string().as_bytes());
        let fingerprint = hex_encode(&hasher.finalize());

        let issued_at = Utc::now();
        let expires_at = issued_at + ChronoDuration::days(validity_days as i64);

        let mut actual = target.clone();
        actual.spec = json!({
            "common_name": common_name,
            "subject_alt_names": target.spec.get("subject_alt_names").cloned().unwrap_or(json!([])),
            "validity_days": validity_days,
            "fingerprint": fingerprint,
            "issued_at": issued_at.to_rfc3339(),
            "expires_at": expires_at.to_rfc3339(),
        });
        self.observed.write().await.push(actual.clone());
        Ok(actual)
    }

    async fn update(&self, target: &StoredEntity, prior_actual: &StoredEntity) -> Result<StoredEntity, DriverError> {
        debug!(id = %target.envelope.id, "certificate driver: update (reissue)");
        if self.converges(target, prior_actual) {
            return Ok(prior_actual.clone());
        }
        {
            let mut observed = self.observed.write().await;
            observed.retain(|e| e.envelope.id != target.envelope.id);
        }
        self.create(target).await
    }

    async fn delete(&self, actual: &StoredEntity) -> Result<(), DriverError> {
        debug!(id = %actual.envelope.id, "certificate driver: delete");
        let mut observed = self.observed.write().await;
        observed.retain(|e| e.envelope.id != actual.envelope.id);
        Ok(())
    }

    fn converges(&self, target: &StoredEntity, actual: &StoredEntity) -> bool {
        target.spec.get("common_name") == actual.spec.get("common_name")
            && target.spec.get("subject_alt_names") == actual.spec.get("subject_alt_names")
            && target.spec.get("validity_days") == actual.spec.get("validity_days")
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc as ChronoUtc;
    use genesis_domain::{EntityId, Envelope, ProjectId, Status};
    use serde_json::json;

    fn target(project_id: ProjectId, spec: serde_json::Value) -> StoredEntity {
        let now = ChronoUtc::now();
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
            spec,
        )
    }

    #[tokio::test]
    async fn password_create_generates_material_of_requested_length() {
        let driver = PasswordDriver::new();
        let t = target(ProjectId::new_v4(), json!({"owner_ref": "svc-a", "length": 24}));
        let actual = driver.create(&t).await.unwrap();
        let material = actual.spec["material"].as_str().unwrap();
        assert_eq!(material.len(), 24);
    }

    #[tokio::test]
    async fn password_rejects_absurd_length() {
        let driver = PasswordDriver::new();
        let t = target(ProjectId::new_v4(), json!({"owner_ref": "svc-a", "length": 0}));
        assert!(driver.create(&t).await.is_err());
    }

    #[tokio::test]
    async fn certificate_create_sets_fingerprint_and_expiry() {
        let driver = CertificateDriver::new();
        let t = target(
            ProjectId::new_v4(),
            json!({"common_name": "api.example.com", "subject_alt_names": [], "validity_days": 30}),
        );
        let actual = driver.create(&t).await.unwrap();
        assert!(actual.spec["fingerprint"].as_str().unwrap().len() > 0);
        assert!(actual.spec["expires_at"].as_str().is_some());
    }

    #[tokio::test]
    async fn certificate_update_is_noop_when_converged() {
        let driver = CertificateDriver::new();
        let t = target(
            ProjectId::new_v4(),
            json!({"common_name": "api.example.com", "subject_alt_names": [], "validity_days": 30}),
        );
        let actual = driver.create(&t).await.unwrap();
        let updated = driver.update(&t, &actual).await.unwrap();
        assert_eq!(updated.spec["fingerprint"], actual.spec["fingerprint"]);
    }
}
