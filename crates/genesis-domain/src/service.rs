use serde::{Deserialize, Serialize};

use crate::envelope::EntityId;
use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Simple,
    Oneshot,
    Monopoly,
    MonopolyOneshot,
}

impl ServiceKind {
    pub fn is_monopoly(&self) -> bool {
        matches!(self, ServiceKind::Monopoly | ServiceKind::MonopolyOneshot)
    }

    pub fn is_oneshot(&self) -> bool {
        matches!(self, ServiceKind::Oneshot | ServiceKind::MonopolyOneshot)
    }
}

/// A service's deployment target is a single node or a named set of nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "target_type", rename_all = "snake_case")]
pub enum DeploymentTarget {
    Node { node_id: EntityId },
    NodeSet { node_ids: Vec<EntityId> },
}

/// A `before`/`after` hook entry. `Hook::Service` is rejected by
/// [`validate_hooks`] until service-to-service dependency ordering is
/// designed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "hook_type", rename_all = "snake_case")]
pub enum Hook {
    Shell { cmd: String },
    Service { service_id: EntityId },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub kind: ServiceKind,
    pub target: DeploymentTarget,
    pub command: String,
    pub user: String,
    pub group: String,
    pub before: Vec<Hook>,
    pub after: Vec<Hook>,
}

/// Service-to-service dependency ordering is documented as TBD upstream.
/// Until the ordering subsystem lands, any `before`/`after` entry that
/// references another service is a validation error rather than silently
/// ignored or half-implemented.
pub fn validate_hooks(before: &[Hook], after: &[Hook]) -> Result<(), DomainError> {
    for hook in before.iter().chain(after.iter()) {
        if let Hook::Service { service_id } = hook {
            return Err(DomainError::UnresolvedServiceDependency(*service_id));
        }
    }
    Ok(())
}

/// The projection of a [`Service`] onto one [`Node`](crate::compute::Node).
/// Created by the orchestrator reconciler's fan-out, consumed by the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceNode {
    pub service_id: EntityId,
    pub node_id: EntityId,
    pub oneshot: bool,
}

/// Render a minimal systemd unit. This is illustrative plumbing for the
/// `before`/`after` hook shape, not a template-generation subsystem in its
/// own right.
pub fn render_unit(service: &Service) -> String {
    let mut unit = String::new();
    unit.push_str("[Unit]\n");
    unit.push_str(&format!("Description={}\n", service.name));
    unit.push('\n');
    unit.push_str("[Service]\n");
    match service.kind {
        ServiceKind::Simple | ServiceKind::Monopoly => unit.push_str("Type=simple\n"),
        ServiceKind::Oneshot | ServiceKind::MonopolyOneshot => unit.push_str("Type=oneshot\n"),
    }
    for hook in &service.before {
        if let Hook::Shell { cmd } = hook {
            unit.push_str(&format!("ExecStartPre={cmd}\n"));
        }
    }
    unit.push_str(&format!("ExecStart={}\n", service.command));
    for hook in &service.after {
        if let Hook::Shell { cmd } = hook {
            unit.push_str(&format!("ExecStartPost={cmd}\n"));
        }
    }
    unit.push_str(&format!("User={}\n", service.user));
    unit.push_str(&format!("Group={}\n", service.group));
    unit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_hooks_accepts_shell_only() {
        let before = vec![Hook::Shell { cmd: "echo hi".into() }];
        let after = vec![];
        assert!(validate_hooks(&before, &after).is_ok());
    }

    #[test]
    fn validate_hooks_rejects_service_dependency() {
        let before = vec![Hook::Service { service_id: EntityId::new_v4() }];
        let err = validate_hooks(&before, &[]).unwrap_err();
        assert!(matches!(err, DomainError::UnresolvedServiceDependency(_)));
    }

    #[test]
    fn render_unit_includes_hooks() {
        let service = Service {
            name: "web".into(),
            kind: ServiceKind::Simple,
            target: DeploymentTarget::Node { node_id: EntityId::new_v4() },
            command: "/usr/bin/web".into(),
            user: "web".into(),
            group: "web".into(),
            before: vec![Hook::Shell { cmd: "mkdir -p /var/run/web".into() }],
            after: vec![],
        };
        let unit = render_unit(&service);
        assert!(unit.contains("ExecStartPre=mkdir -p /var/run/web"));
        assert!(unit.contains("ExecStart=/usr/bin/web"));
    }
}
