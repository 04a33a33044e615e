use genesis_domain::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("store error: {0}")]
    Store(#[from] genesis_store::StoreError),
    #[error("driver error: {0}")]
    Driver(#[from] genesis_driver::DriverError),
    #[error("tick worker panicked: {0}")]
    JoinError(String),
}

impl AgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::Store(e) => e.kind(),
            AgentError::Driver(e) => e.kind(),
            AgentError::JoinError(_) => ErrorKind::Permanent,
        }
    }
}
