use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use genesis_domain::{EntityKind, Envelope, ProjectId, Service, Status, Target};
use genesis_scheduler::Scheduler;
use genesis_store::{now, ResourceStore, StatusDiscriminant, StoredEntity};
use tracing::{debug, warn};

use crate::cascade::{cascade_delete, has_remaining_children};
use crate::error::ReconcileError;
use crate::fanout::fan_out;
use crate::report::{Change, ReconcileReport};

/// What happened to a claim during [`ReconcileWorker::process_claim`],
/// deciding how `run_once` releases it afterward.
enum ClaimOutcome {
    /// Cascade marked every dependent `DELETING` and none remain — this
    /// kind's own row is physically removed.
    Deleted,
    /// Cascade marked dependents `DELETING`, but at least one (a different
    /// kind, torn down by its own worker on a later tick) still physically
    /// exists. The claim stays `DELETING` and unclaimed for a later recheck.
    CascadePending,
    /// No eligible agent existed this tick.
    Deferred,
    /// An agent was selected (and, for services, fan-out ran). Whether this
    /// advances to ACTIVE still depends on an observed actual.
    Placed,
}

/// One claim/placement/fan-out/cascade worker for a single resource kind
/// family. The orchestrator runs one of these per reconciled `EntityKind`.
pub struct ReconcileWorker {
    kind_family: EntityKind,
    store: Arc<dyn ResourceStore>,
    scheduler: Arc<Scheduler>,
    lease: Duration,
    max_attempts: u32,
}

impl ReconcileWorker {
    pub fn new(kind_family: EntityKind, store: Arc<dyn ResourceStore>, scheduler: Arc<Scheduler>, lease: Duration, max_attempts: u32) -> Self {
        Self { kind_family, store, scheduler, lease, max_attempts }
    }

    /// Claims a batch, processes each claim, and releases it. One call is
    /// one worker tick.
    pub async fn run_once(&self, batch_size: usize) -> Result<ReconcileReport, ReconcileError> {
        let mut report = ReconcileReport::new();
        let claims = self.claim_batch(batch_size).await?;
        for claim in claims {
            let id = claim.envelope.id;
            match self.process_claim(claim.clone(), &mut report).await {
                Ok(ClaimOutcome::Deleted) => self.store.delete(self.kind_family, claim.envelope.id).await?,
                Ok(ClaimOutcome::CascadePending) => self.release_cascade_pending(claim).await?,
                Ok(ClaimOutcome::Deferred) => self.release_deferred(claim).await?,
                Ok(ClaimOutcome::Placed) => self.release_placed(claim).await?,
                Err(err) => {
                    warn!(kind = ?self.kind_family, id = %id, error = %err, "reconcile: claim failed");
                    report.errors.push(err.to_string());
                    self.release_failed(claim, err.to_string(), &mut report).await?;
                }
            }
        }
        Ok(report)
    }

    /// Atomically moves targets in `NEW` (any age), `DELETING` (any age), or
    /// `IN_PROGRESS` past a stale lease into a claimed state with a fresh
    /// lease, oldest first. Loses the CAS race silently to a peer worker
    /// rather than erroring.
    async fn claim_batch(&self, batch_size: usize) -> Result<Vec<StoredEntity>, ReconcileError> {
        let now = now();
        let mut candidates = self.store.scan_stale(self.kind_family, StatusDiscriminant::New, now).await?;
        let mut deleting = self.store.scan_stale(self.kind_family, StatusDiscriminant::Deleting, now).await?;
        let lease_cutoff = now - ChronoDuration::from_std(self.lease).unwrap_or_else(|_| ChronoDuration::seconds(30));
        let mut expired_claims = self.store.scan_stale(self.kind_family, StatusDiscriminant::InProgress, lease_cutoff).await?;
        candidates.append(&mut deleting);
        candidates.append(&mut expired_claims);
        candidates.sort_by_key(|entity| entity.envelope.created_at);
        candidates.truncate(batch_size);

        let mut claimed = Vec::new();
        for mut entity in candidates {
            let expected_version = entity.envelope.version;
            let lease_until = now + ChronoDuration::from_std(self.lease).unwrap_or_else(|_| ChronoDuration::seconds(30));
            entity.envelope.mark_claimed(now, lease_until);
            match self.store.upsert_target(self.kind_family, entity, Some(expected_version)).await {
                Ok(stored) => claimed.push(stored),
                Err(genesis_store::StoreError::Conflict { .. }) => continue,
                Err(other) => return Err(other.into()),
            }
        }
        Ok(claimed)
    }

    async fn process_claim(&self, claim: StoredEntity, report: &mut ReconcileReport) -> Result<ClaimOutcome, ReconcileError> {
        let id = claim.envelope.id;

        if claim.envelope.status == Status::Deleting {
            let marked = cascade_delete(self.store.as_ref(), self.kind_family, id).await?;
            for (kind, marked_id) in marked {
                report.changes.push(Change::Deleted { kind, id: marked_id });
                if kind == EntityKind::ServiceNode || kind == EntityKind::Service {
                    self.scheduler.release_monopoly(marked_id);
                }
            }
            if has_remaining_children(self.store.as_ref(), self.kind_family, id).await? {
                debug!(kind = ?self.kind_family, id = %id, "reconcile: cascade pending, dependents not yet gone");
                return Ok(ClaimOutcome::CascadePending);
            }
            return Ok(ClaimOutcome::Deleted);
        }

        let agent = match self.scheduler.select(self.kind_family) {
            Ok(agent) => agent,
            Err(_) => {
                // No eligible agent right now: defer, not fail. Re-NEW the
                // target so a later tick retries after backoff.
                debug!(kind = ?self.kind_family, id = %id, "reconcile: no eligible agent, deferring");
                report.changes.push(Change::Deferred { kind: self.kind_family, id, reason: "no eligible agent".into() });
                return Ok(ClaimOutcome::Deferred);
            }
        };
        debug!(kind = ?self.kind_family, id = %id, agent = %agent, "reconcile: placed");

        if self.kind_family == EntityKind::Service {
            self.fan_out_service(&claim).await?;
        }

        report.changes.push(Change::Updated { kind: self.kind_family, id });
        Ok(ClaimOutcome::Placed)
    }

    async fn fan_out_service(&self, claim: &StoredEntity) -> Result<(), ReconcileError> {
        let service: Service = serde_json::from_value(claim.spec.clone())
            .map_err(|e| ReconcileError::Internal(format!("malformed service spec: {e}")))?;
        let target = Target { envelope: claim.envelope.clone(), spec: service };

        if target.spec.kind.is_monopoly() {
            self.scheduler.select_monopoly(target.envelope.id, EntityKind::ServiceNode)?;
        }

        for service_node in fan_out(&target) {
            let spec = serde_json::to_value(&service_node)
                .map_err(|e| ReconcileError::Internal(format!("serializing service node: {e}")))?;
            let project_id: ProjectId = target.envelope.project_id;
            let entity = StoredEntity::new(Envelope::new(project_id, now()), spec);
            self.store.upsert_target(EntityKind::ServiceNode, entity, None).await?;
        }
        Ok(())
    }

    /// Releases a claim that found no eligible agent this tick, sending it
    /// back to `NEW` so the next tick retries placement rather than sitting
    /// out a full lease window.
    async fn release_deferred(&self, mut claim: StoredEntity) -> Result<(), ReconcileError> {
        let expected_version = claim.envelope.version;
        claim.envelope.status = Status::New;
        claim.envelope.release_claim(now());
        self.store.upsert_target(self.kind_family, claim, Some(expected_version)).await?;
        Ok(())
    }

    /// Releases a successfully-placed claim. Placement only means an
    /// eligible agent was found, not that it has converged — ACTIVE is
    /// reserved for a target the store shows a matching actual for (§3,
    /// §4.4). If no actual exists yet, the claim stays `IN_PROGRESS` and
    /// unclaimed, to be picked back up once its lease goes stale.
    async fn release_placed(&self, mut claim: StoredEntity) -> Result<(), ReconcileError> {
        let expected_version = claim.envelope.version;
        let id = claim.envelope.id;
        let without_actual = self.store.scan_targets_without_actual(self.kind_family).await?;
        let actual_observed = !without_actual.iter().any(|e| e.envelope.id == id);

        if actual_observed {
            claim.envelope.mark_active(now());
        } else {
            claim.envelope.release_claim(now());
        }
        self.store.upsert_target(self.kind_family, claim, Some(expected_version)).await?;
        Ok(())
    }

    /// Releases a claim whose cascade marked dependents `DELETING` but at
    /// least one still physically exists. Stays `DELETING` (left untouched
    /// by `release_claim`) and just clears the claim lease so `claim_batch`
    /// picks it back up — and `has_remaining_children` is rechecked — on a
    /// later tick once those dependents are actually gone.
    async fn release_cascade_pending(&self, mut claim: StoredEntity) -> Result<(), ReconcileError> {
        let expected_version = claim.envelope.version;
        claim.envelope.release_claim(now());
        self.store.upsert_target(self.kind_family, claim, Some(expected_version)).await?;
        Ok(())
    }

    async fn release_failed(&self, mut claim: StoredEntity, reason: String, report: &mut ReconcileReport) -> Result<(), ReconcileError> {
        let expected_version = claim.envelope.version;
        let next_attempts = claim.envelope.attempt_count + 1;
        let id = claim.envelope.id;

        if next_attempts >= self.max_attempts {
            claim.envelope.mark_error(now(), reason.clone());
            report.changes.push(Change::MarkedError { kind: self.kind_family, id, reason });
        } else {
            claim.envelope.attempt_count = next_attempts;
            claim.envelope.release_claim(now());
            claim.envelope.status = Status::New;
            report.changes.push(Change::Deferred { kind: self.kind_family, id, reason });
        }
        self.store.upsert_target(self.kind_family, claim, Some(expected_version)).await?;
        Ok(())
    }
}
