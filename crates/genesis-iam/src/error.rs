use genesis_domain::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IamError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("entity not found: {0}")]
    NotFound(String),
    #[error("invalid permission name: {0}")]
    Validation(String),
    #[error("store error: {0}")]
    Store(#[from] genesis_store::StoreError),
}

impl IamError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IamError::PermissionDenied => ErrorKind::PermissionDenied,
            IamError::NotFound(_) => ErrorKind::NotFound,
            IamError::Validation(_) => ErrorKind::Validation,
            IamError::Store(e) => e.kind(),
        }
    }
}
