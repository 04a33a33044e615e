use genesis_domain::{EntityId, EntityKind, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind:?} {id} not found")]
    NotFound { kind: EntityKind, id: EntityId },

    #[error("version conflict: expected {expected}, actual was {actual}")]
    Conflict { expected: u64, actual: u64 },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::Conflict { .. } => ErrorKind::Conflict,
            StoreError::Serialization(_) => ErrorKind::Validation,
            StoreError::Internal(_) => ErrorKind::Transient,
        }
    }
}
