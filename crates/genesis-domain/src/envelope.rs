use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier shared by every persistent entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| DomainError::InvalidEntityId(s.to_string()))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A project scope. `None` denotes the org-wide / unscoped context used by
/// bootstrap bindings and IAM entities that predate any project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId(pub Uuid);

impl ProjectId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| DomainError::InvalidProjectId(s.to_string()))
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed lifecycle state. DELETING is terminal; physical removal happens once
/// every dependent is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Status {
    New,
    InProgress,
    Active,
    Error { reason: String },
    Deleting,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::New => write!(f, "NEW"),
            Status::InProgress => write!(f, "IN_PROGRESS"),
            Status::Active => write!(f, "ACTIVE"),
            Status::Error { reason } => write!(f, "ERROR ({reason})"),
            Status::Deleting => write!(f, "DELETING"),
        }
    }
}

/// The envelope every persistent entity carries: identity, scope, timestamps,
/// optimistic-concurrency version, and lifecycle status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: EntityId,
    pub project_id: ProjectId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
    pub status: Status,
    /// Set while an orchestrator worker holds a claim; cleared on release.
    pub claimed_until: Option<DateTime<Utc>>,
    pub attempt_count: u32,
}

impl Envelope {
    pub fn new(project_id: ProjectId, now: DateTime<Utc>) -> Self {
        Self {
            id: EntityId::new_v4(),
            project_id,
            created_at: now,
            updated_at: now,
            version: 1,
            status: Status::New,
            claimed_until: None,
            attempt_count: 0,
        }
    }

    /// Bump version and timestamp. Every successful update goes through this
    /// so version monotonicity holds by construction.
    fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }

    /// Claims an entity for a lease window. A target already `Deleting`
    /// stays `Deleting` — claiming it is about serializing cascade/delete
    /// work against peer workers, not a lifecycle transition.
    pub fn mark_claimed(&mut self, now: DateTime<Utc>, lease_until: DateTime<Utc>) {
        if self.status != Status::Deleting {
            self.status = Status::InProgress;
        }
        self.claimed_until = Some(lease_until);
        self.touch(now);
    }

    pub fn mark_active(&mut self, now: DateTime<Utc>) {
        self.status = Status::Active;
        self.claimed_until = None;
        self.attempt_count = 0;
        self.touch(now);
    }

    pub fn mark_error(&mut self, now: DateTime<Utc>, reason: impl Into<String>) {
        self.status = Status::Error { reason: reason.into() };
        self.claimed_until = None;
        self.touch(now);
    }

    pub fn mark_deleting(&mut self, now: DateTime<Utc>) {
        self.status = Status::Deleting;
        self.touch(now);
    }

    pub fn release_claim(&mut self, now: DateTime<Utc>) {
        self.claimed_until = None;
        self.touch(now);
    }
}

/// Closed, compile-time enumeration of every reconciled (and IAM) entity kind.
/// New kinds are added here and in the capability driver registry, never via
/// a free-form string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Node,
    MachinePool,
    Network,
    Subnet,
    Interface,
    Service,
    ServiceNode,
    LoadBalancer,
    Vhost,
    Route,
    BackendPool,
    Password,
    Certificate,
    User,
    Organization,
    OrganizationMember,
    Project,
    Permission,
    Role,
    PermissionBinding,
    RoleBinding,
    IamClient,
}

impl EntityKind {
    /// Kinds reconciled by a capability driver through the target/actual loop.
    /// IAM kinds are written and read directly; they have no driver-observed
    /// actual side.
    pub fn is_reconciled(&self) -> bool {
        !matches!(
            self,
            EntityKind::User
                | EntityKind::Organization
                | EntityKind::OrganizationMember
                | EntityKind::Project
                | EntityKind::Permission
                | EntityKind::Role
                | EntityKind::PermissionBinding
                | EntityKind::RoleBinding
                | EntityKind::IamClient
        )
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A desired-state row: the user's ask.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target<T> {
    pub envelope: Envelope,
    pub spec: T,
}

/// An observed-state row: what the agent last saw on the node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actual<T> {
    pub envelope: Envelope,
    pub spec: T,
    /// The target version this actual was produced against (S1's
    /// "converged against" marker).
    pub observed_target_version: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_round_trips() {
        let id = EntityId::new_v4();
        let parsed = EntityId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn invalid_entity_id_rejected() {
        assert!(EntityId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn envelope_mark_active_increments_version_exactly_once() {
        let now = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let mut env = Envelope::new(ProjectId::new_v4(), now);
        let v0 = env.version;
        env.mark_active(now);
        assert_eq!(env.version, v0 + 1);
        assert_eq!(env.status, Status::Active);
    }

    #[test]
    fn envelope_mark_error_preserves_reason() {
        let now = Utc::now();
        let mut env = Envelope::new(ProjectId::new_v4(), now);
        env.mark_error(now, "driver unreachable");
        match env.status {
            Status::Error { ref reason } => assert_eq!(reason, "driver unreachable"),
            _ => panic!("expected Error status"),
        }
    }
}
