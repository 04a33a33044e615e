use std::fmt;

use chrono::{DateTime, Utc};
use genesis_domain::EntityKind;
use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// An agent's self-assigned identity, advertised at registration. Kept as an
/// opaque string (typically a hostname) rather than an `EntityId` since
/// agents are processes, not reconciled resources, and the monopoly
/// tie-break rule needs lexicographic ordering over exactly this value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The canonical capability-kind string for an [`EntityKind`], matched
/// against each agent's advertised [`CapabilityLabel`]s. IAM kinds have no
/// driver side and are never scheduled, so they return
/// [`SchedulerError::NotScheduled`] instead of panicking — an accidental
/// attempt to schedule one should fail that one claim, not abort the
/// worker tick it runs in.
pub fn capability_kind(kind: EntityKind) -> Result<&'static str, SchedulerError> {
    Ok(match kind {
        EntityKind::Node => "em_core_compute_nodes",
        EntityKind::MachinePool => "em_core_machine_pools",
        EntityKind::Network => "em_core_networks",
        EntityKind::Subnet => "em_core_subnets",
        EntityKind::Interface => "em_core_interfaces",
        EntityKind::Service => "em_core_services",
        EntityKind::ServiceNode => "em_core_services",
        EntityKind::LoadBalancer => "em_core_load_balancers",
        EntityKind::Vhost => "em_core_vhosts",
        EntityKind::Route => "em_core_routes",
        EntityKind::BackendPool => "em_core_backend_pools",
        EntityKind::Password => "password",
        EntityKind::Certificate => "certificate",
        other => return Err(SchedulerError::NotScheduled { kind: other }),
    })
}

/// A glob pattern an agent advertises at registration, e.g. `em_core_*` or
/// the literal `password`. Segment-wise `*`-suffix matching is sufficient
/// for every label shape this workspace's capability kinds take, so a
/// dedicated glob crate is not pulled in for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityLabel(pub String);

impl CapabilityLabel {
    pub fn matches(&self, kind: &str) -> bool {
        match self.0.strip_suffix('*') {
            Some(prefix) => kind.starts_with(prefix),
            None => self.0 == kind,
        }
    }
}

/// A live agent's registration record: which capability kinds it can drive,
/// when it was last heard from, and how many targets it already carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentHandle {
    pub id: AgentId,
    pub capability_labels: Vec<CapabilityLabel>,
    pub last_heartbeat: DateTime<Utc>,
    pub outstanding_load: u32,
}

impl AgentHandle {
    pub fn advertises(&self, kind: &str) -> bool {
        self.capability_labels.iter().any(|label| label.matches(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_label_matches_prefixed_kind() {
        let label = CapabilityLabel("em_core_*".to_string());
        assert!(label.matches("em_core_compute_nodes"));
        assert!(!label.matches("password"));
    }

    #[test]
    fn literal_label_matches_only_exact_kind() {
        let label = CapabilityLabel("password".to_string());
        assert!(label.matches("password"));
        assert!(!label.matches("certificate"));
    }

    #[test]
    fn iam_kind_is_not_scheduled() {
        let err = capability_kind(EntityKind::RoleBinding).unwrap_err();
        assert!(matches!(err, SchedulerError::NotScheduled { kind: EntityKind::RoleBinding }));
    }
}
