use genesis_domain::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("subscriber failed transiently: {0}")]
    Transient(String),
    #[error("subscriber failed permanently: {0}")]
    Permanent(String),
    #[error("store error: {0}")]
    Store(#[from] genesis_store::StoreError),
}

impl EventError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EventError::Transient(_) => ErrorKind::Transient,
            EventError::Permanent(_) => ErrorKind::Permanent,
            EventError::Store(e) => e.kind(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transient)
    }
}
