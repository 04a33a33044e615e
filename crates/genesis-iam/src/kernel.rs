use std::sync::Mutex;
use std::time::{Duration, Instant};

use genesis_domain::{EntityId, EntityKind, PermissionBinding, PermissionTriple, ProjectId, RoleBinding};
use genesis_store::{ResourceStore, ScanFilter};
use lru::LruCache;
use tracing::debug;

use crate::error::IamError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MemoKey {
    subject: EntityId,
    project: Option<ProjectId>,
    permission: String,
}

/// Answers *may subject S perform action A on a resource inside project P?*
/// against the RoleBinding -> PermissionBinding -> Permission chain, deny by
/// default. Has no direct teacher analogue — this codebase's family has no
/// authorization layer — so it is built from first principles in the same
/// trait-object-plus-typed-error idiom used everywhere else in this
/// workspace.
pub struct IamKernel {
    store: std::sync::Arc<dyn ResourceStore>,
    bootstrap_admin_user_id: EntityId,
    memo_ttl: Duration,
    memo: Mutex<LruCache<MemoKey, (bool, Instant)>>,
}

const MEMO_CAPACITY: usize = 512;

impl IamKernel {
    pub fn new(store: std::sync::Arc<dyn ResourceStore>, bootstrap_admin_user_id: EntityId, memo_ttl_ms: u64) -> Self {
        Self {
            store,
            bootstrap_admin_user_id,
            memo_ttl: Duration::from_millis(memo_ttl_ms),
            memo: Mutex::new(LruCache::new(std::num::NonZeroUsize::new(MEMO_CAPACITY).unwrap())),
        }
    }

    /// Clears the whole memoization cache. Callers that mutate a RoleBinding
    /// or PermissionBinding must call this so a concurrently revoked role
    /// cannot slip through past the memoization window — a coarse but
    /// simple invalidation that trivially satisfies "guaranteed within the
    /// same bound" without per-key dependency tracking.
    pub fn invalidate_all(&self) {
        self.memo.lock().expect("iam memo mutex poisoned").clear();
    }

    pub async fn check(
        &self,
        subject: EntityId,
        project: Option<ProjectId>,
        required: &PermissionTriple,
    ) -> Result<(), IamError> {
        if subject == self.bootstrap_admin_user_id {
            debug!(subject = %subject, "iam: bootstrap admin — unconditional grant");
            return Ok(());
        }

        let key = MemoKey { subject, project, permission: required.to_string() };
        if let Some(&(granted, at)) = self.memo.lock().expect("iam memo mutex poisoned").peek(&key) {
            if at.elapsed() < self.memo_ttl {
                return if granted { Ok(()) } else { Err(IamError::PermissionDenied) };
            }
        }

        let granted = self.resolve(subject, project, required).await?;
        self.memo.lock().expect("iam memo mutex poisoned").put(key, (granted, Instant::now()));

        if granted {
            Ok(())
        } else {
            Err(IamError::PermissionDenied)
        }
    }

    async fn resolve(
        &self,
        subject: EntityId,
        project: Option<ProjectId>,
        required: &PermissionTriple,
    ) -> Result<bool, IamError> {
        let role_bindings = self.store.list(EntityKind::RoleBinding, None, ScanFilter::default()).await?;
        let mut role_ids: Vec<EntityId> = Vec::new();
        for entity in &role_bindings {
            let binding: RoleBinding = serde_json::from_value(entity.spec.clone())
                .map_err(|e| IamError::Validation(e.to_string()))?;
            if binding.user_id == subject && scope_matches(binding.project_id, project) {
                role_ids.push(binding.role_id);
            }
        }
        if role_ids.is_empty() {
            debug!(subject = %subject, "iam: no role bindings — deny");
            return Ok(false);
        }

        let permission_bindings = self.store.list(EntityKind::PermissionBinding, None, ScanFilter::default()).await?;
        let mut permission_ids: Vec<EntityId> = Vec::new();
        for entity in &permission_bindings {
            let binding: PermissionBinding = serde_json::from_value(entity.spec.clone())
                .map_err(|e| IamError::Validation(e.to_string()))?;
            if role_ids.contains(&binding.role_id) && scope_matches(binding.project_id, project) {
                permission_ids.push(binding.permission_id);
            }
        }
        if permission_ids.is_empty() {
            debug!(subject = %subject, "iam: no permission bindings reachable — deny");
            return Ok(false);
        }

        for permission_id in permission_ids {
            let Some(entity) = self.store.get(EntityKind::Permission, permission_id).await? else {
                continue;
            };
            let permission: genesis_domain::Permission = serde_json::from_value(entity.spec)
                .map_err(|e| IamError::Validation(e.to_string()))?;
            if permission.name.matches(required) {
                debug!(subject = %subject, permission = %permission.name, "iam: match — grant");
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// A binding scoped to `None` (org-wide) applies regardless of the
/// requested project; a binding scoped to `Some(p)` only applies when the
/// requested project is that same project.
fn scope_matches(binding_project: Option<ProjectId>, requested: Option<ProjectId>) -> bool {
    match binding_project {
        None => true,
        Some(p) => requested == Some(p),
    }
}
