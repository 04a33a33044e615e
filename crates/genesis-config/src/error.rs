use genesis_domain::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("yaml parse error in {path}: {source}")]
    YamlParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config value: {0}")]
    Invalid(String),

    #[error("domain error: {0}")]
    Domain(#[from] genesis_domain::DomainError),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}
