use genesis_domain::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no eligible agent advertises capability for {kind}")]
    NoEligibleAgent { kind: String },
    #[error("{kind:?} has no driver side and is never scheduled")]
    NotScheduled { kind: genesis_domain::EntityKind },
}

impl SchedulerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchedulerError::NoEligibleAgent { .. } => ErrorKind::Transient,
            SchedulerError::NotScheduled { .. } => ErrorKind::Permanent,
        }
    }
}
