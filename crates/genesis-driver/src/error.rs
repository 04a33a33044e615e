use genesis_domain::{EntityKind, ErrorKind};
use thiserror::Error;

/// Typed driver failure. Only `Transient` is retried by the agent;
/// `Permanent` moves the target to ERROR with a durable reason.
#[derive(Debug, Error, Clone)]
pub enum DriverError {
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    #[error("permanent failure: {0}")]
    Permanent(String),
    #[error("no driver registered for kind {0:?}")]
    DriverNotConfigured(EntityKind),
}

impl DriverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DriverError::Transient(_) => ErrorKind::Transient,
            DriverError::InvalidInput(_) => ErrorKind::Validation,
            DriverError::PreconditionFailed(_) => ErrorKind::Conflict,
            DriverError::Permanent(_) => ErrorKind::Permanent,
            DriverError::DriverNotConfigured(_) => ErrorKind::Permanent,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, DriverError::Transient(_))
    }
}
