use thiserror::Error;

use crate::envelope::EntityId;

/// Validation failures raised at construction time by domain types. These
/// are always `ErrorKind::Validation` — they never represent a storage or
/// driver failure.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid entity id '{0}'")]
    InvalidEntityId(String),
    #[error("invalid project id '{0}'")]
    InvalidProjectId(String),
    #[error("invalid permission name '{0}': must match [a-z_]+(.[a-z_*]+){{2}}")]
    InvalidPermission(String),
    #[error("service-to-service dependency ordering is unresolved (service {0})")]
    UnresolvedServiceDependency(EntityId),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl DomainError {
    pub fn kind(&self) -> crate::ErrorKind {
        crate::ErrorKind::Validation
    }
}
