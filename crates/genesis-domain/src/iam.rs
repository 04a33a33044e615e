use std::fmt;

use serde::{Deserialize, Serialize};

use crate::envelope::{EntityId, ProjectId};
use crate::error::DomainError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgRole {
    Owner,
    Member,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationMember {
    pub organization_id: EntityId,
    pub user_id: EntityId,
    pub role: OrgRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub organization_id: EntityId,
    pub name: String,
}

/// A dotted triple `service.resource.action`. Each segment matches
/// `[a-z_]+` or is the literal wildcard `*`. `*.*.*` is reserved for the
/// bootstrap admin and must never be assignable through ordinary role
/// creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionTriple {
    service: String,
    resource: String,
    action: String,
}

pub const BOOTSTRAP_WILDCARD: &str = "*.*.*";

impl PermissionTriple {
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(DomainError::InvalidPermission(s.to_string()));
        }
        for part in &parts {
            if !is_valid_segment(part) {
                return Err(DomainError::InvalidPermission(s.to_string()));
            }
        }
        Ok(Self {
            service: parts[0].to_string(),
            resource: parts[1].to_string(),
            action: parts[2].to_string(),
        })
    }

    /// Does this stored permission (which may contain `*` segments) match a
    /// required permission triple? Each segment must be literally equal or
    /// the stored segment must be `*`.
    pub fn matches(&self, required: &PermissionTriple) -> bool {
        segment_matches(&self.service, &required.service)
            && segment_matches(&self.resource, &required.resource)
            && segment_matches(&self.action, &required.action)
    }

    pub fn is_bootstrap_wildcard(&self) -> bool {
        self.service == "*" && self.resource == "*" && self.action == "*"
    }
}

fn segment_matches(stored: &str, required: &str) -> bool {
    stored == "*" || stored == required
}

fn is_valid_segment(segment: &str) -> bool {
    // `[a-z_]+` or the literal wildcard `*`.
    segment == "*"
        || (!segment.is_empty() && segment.chars().all(|c| c.is_ascii_lowercase() || c == '_'))
}

impl fmt::Display for PermissionTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.service, self.resource, self.action)
    }
}

impl TryFrom<String> for PermissionTriple {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PermissionTriple> for String {
    fn from(value: PermissionTriple) -> Self {
        value.to_string()
    }
}

/// A named, reusable permission grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    pub name: PermissionTriple,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
}

/// Binds a Role to a Permission, optionally scoped to a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionBinding {
    pub role_id: EntityId,
    pub permission_id: EntityId,
    pub project_id: Option<ProjectId>,
}

/// Binds a User to a Role, optionally scoped to a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleBinding {
    pub user_id: EntityId,
    pub role_id: EntityId,
    pub project_id: Option<ProjectId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IamClient {
    pub name: String,
    pub redirect_uris: Vec<String>,
}
