use genesis_domain::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("config error: {0}")]
    Config(#[from] genesis_config::ConfigError),

    #[error("store error: {0}")]
    Store(#[from] genesis_store::StoreError),

    #[error("driver error: {0}")]
    Driver(#[from] genesis_driver::DriverError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] genesis_scheduler::SchedulerError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ReconcileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReconcileError::Config(e) => e.kind(),
            ReconcileError::Store(e) => e.kind(),
            ReconcileError::Driver(e) => e.kind(),
            ReconcileError::Scheduler(e) => e.kind(),
            ReconcileError::Internal(_) => ErrorKind::Permanent,
        }
    }
}
