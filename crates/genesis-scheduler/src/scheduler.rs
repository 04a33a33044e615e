use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use genesis_domain::{EntityId, EntityKind};
use tracing::debug;

use crate::capability::{capability_kind, AgentHandle, AgentId};
use crate::error::SchedulerError;

/// Chooses which agent gets which target resource: capability-label match,
/// heartbeat freshness, then least-loaded with a deterministic tie-break.
/// Generalizes this workspace's static cloud-keyed `DriverRegistry` into a
/// dynamic, heartbeat-aware registry of live agents.
pub struct Scheduler {
    agents: Mutex<HashMap<AgentId, AgentHandle>>,
    monopoly_assignments: Mutex<HashMap<EntityId, AgentId>>,
    staleness_bound: Duration,
}

impl Scheduler {
    pub fn new(staleness_bound: Duration) -> Self {
        Self {
            agents: Mutex::new(HashMap::new()),
            monopoly_assignments: Mutex::new(HashMap::new()),
            staleness_bound,
        }
    }

    pub fn register(&self, handle: AgentHandle) {
        debug!(agent = %handle.id, labels = ?handle.capability_labels, "agent registered");
        self.agents.lock().expect("scheduler agents mutex poisoned").insert(handle.id.clone(), handle);
    }

    pub fn heartbeat(&self, id: &AgentId, outstanding_load: u32) {
        let mut agents = self.agents.lock().expect("scheduler agents mutex poisoned");
        if let Some(agent) = agents.get_mut(id) {
            agent.last_heartbeat = Utc::now();
            agent.outstanding_load = outstanding_load;
        }
    }

    /// Picks an eligible agent for an ordinary (non-monopoly) target of kind
    /// `kind`. Callers needing the once-globally uniqueness guarantee for a
    /// monopoly resource should use [`Scheduler::select_monopoly`] instead.
    pub fn select(&self, kind: EntityKind) -> Result<AgentId, SchedulerError> {
        self.select_eligible(kind)
    }

    /// Same selection process as [`Scheduler::select`], but idempotent per
    /// `entity_id`: a target already monopoly-assigned returns its existing
    /// assignment rather than re-selecting, so repeated scheduling calls
    /// (e.g. from successive reconcile ticks) never reassign a live
    /// monopoly instance to a different agent.
    pub fn select_monopoly(&self, entity_id: EntityId, kind: EntityKind) -> Result<AgentId, SchedulerError> {
        if let Some(existing) = self.monopoly_assignments.lock().expect("monopoly mutex poisoned").get(&entity_id) {
            return Ok(existing.clone());
        }
        let chosen = self.select_eligible(kind)?;
        self.monopoly_assignments
            .lock()
            .expect("monopoly mutex poisoned")
            .insert(entity_id, chosen.clone());
        Ok(chosen)
    }

    /// Clears a monopoly assignment so a future `select_monopoly` call for
    /// the same entity re-selects — used when the monopoly target itself is
    /// deleted.
    pub fn release_monopoly(&self, entity_id: EntityId) {
        self.monopoly_assignments.lock().expect("monopoly mutex poisoned").remove(&entity_id);
    }

    fn select_eligible(&self, kind: EntityKind) -> Result<AgentId, SchedulerError> {
        let capability = capability_kind(kind)?;
        let now = Utc::now();
        let agents = self.agents.lock().expect("scheduler agents mutex poisoned");

        let mut eligible: Vec<&AgentHandle> = agents
            .values()
            .filter(|agent| agent.advertises(capability))
            .filter(|agent| {
                now.signed_duration_since(agent.last_heartbeat).to_std().unwrap_or(Duration::MAX) <= self.staleness_bound
            })
            .collect();

        if eligible.is_empty() {
            return Err(SchedulerError::NoEligibleAgent { kind: capability.to_string() });
        }

        eligible.sort_by(|a, b| a.outstanding_load.cmp(&b.outstanding_load).then_with(|| a.id.cmp(&b.id)));
        let chosen = eligible[0].id.clone();
        debug!(capability, agent = %chosen, "scheduler: selected agent");
        Ok(chosen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityLabel;
    use chrono::Duration as ChronoDuration;

    fn agent(id: &str, labels: &[&str], load: u32, heartbeat_age: ChronoDuration) -> AgentHandle {
        AgentHandle {
            id: AgentId(id.to_string()),
            capability_labels: labels.iter().map(|l| CapabilityLabel(l.to_string())).collect(),
            last_heartbeat: Utc::now() - heartbeat_age,
            outstanding_load: load,
        }
    }

    #[test]
    fn selects_least_loaded_eligible_agent() {
        let scheduler = Scheduler::new(Duration::from_secs(30));
        scheduler.register(agent("a", &["em_core_*"], 5, ChronoDuration::seconds(0)));
        scheduler.register(agent("b", &["em_core_*"], 1, ChronoDuration::seconds(0)));
        let chosen = scheduler.select(EntityKind::Node).unwrap();
        assert_eq!(chosen, AgentId("b".to_string()));
    }

    #[test]
    fn ties_break_by_agent_id() {
        let scheduler = Scheduler::new(Duration::from_secs(30));
        scheduler.register(agent("z", &["em_core_*"], 1, ChronoDuration::seconds(0)));
        scheduler.register(agent("a", &["em_core_*"], 1, ChronoDuration::seconds(0)));
        let chosen = scheduler.select(EntityKind::Node).unwrap();
        assert_eq!(chosen, AgentId("a".to_string()));
    }

    #[test]
    fn stale_heartbeat_excludes_agent() {
        let scheduler = Scheduler::new(Duration::from_secs(30));
        scheduler.register(agent("stale", &["em_core_*"], 0, ChronoDuration::seconds(120)));
        let err = scheduler.select(EntityKind::Node).unwrap_err();
        assert!(matches!(err, SchedulerError::NoEligibleAgent { .. }));
    }

    #[test]
    fn no_matching_capability_label_is_ineligible() {
        let scheduler = Scheduler::new(Duration::from_secs(30));
        scheduler.register(agent("a", &["password"], 0, ChronoDuration::seconds(0)));
        assert!(scheduler.select(EntityKind::Node).is_err());
    }

    #[test]
    fn monopoly_selection_is_idempotent() {
        let scheduler = Scheduler::new(Duration::from_secs(30));
        scheduler.register(agent("a", &["em_core_*"], 0, ChronoDuration::seconds(0)));
        scheduler.register(agent("b", &["em_core_*"], 0, ChronoDuration::seconds(0)));
        let entity_id = EntityId::new_v4();
        let first = scheduler.select_monopoly(entity_id, EntityKind::ServiceNode).unwrap();

        // Even if a lower-loaded agent shows up later, the existing monopoly
        // assignment must not move.
        scheduler.heartbeat(&AgentId("a".to_string()), 0);
        let second = scheduler.select_monopoly(entity_id, EntityKind::ServiceNode).unwrap();
        assert_eq!(first, second);
    }
}
