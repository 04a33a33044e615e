use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// Explicit startup configuration, constructed once and threaded through
/// every constructor that needs it. Replaces ambient configuration
/// singletons entirely — nothing in this workspace reads an env var or a
/// global for a setting this struct carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub db: DbConfig,
    pub universal_agent: AgentEndpoints,
    pub universal_agent_scheduler: SchedulerConfig,
    #[serde(default)]
    pub drivers: HashMap<String, DriverCredentials>,
    pub iam: IamConfig,
    pub events: EventsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    pub connection_url: String,
    #[serde(default = "default_pool_size")]
    pub connection_pool_size: u32,
}

fn default_pool_size() -> u32 {
    8
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEndpoints {
    pub orch_endpoint: String,
    pub status_endpoint: String,
    pub caps_drivers: Vec<String>,
    #[serde(default = "default_poll_period_secs")]
    pub poll_period_secs: u64,
    #[serde(default = "default_jitter_fraction")]
    pub jitter_fraction: f64,
}

fn default_poll_period_secs() -> u64 {
    10
}

fn default_jitter_fraction() -> f64 {
    0.25
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Comma-list with wildcard, e.g. `em_core_*,password,certificate`.
    pub capabilities: Vec<String>,
    #[serde(default = "default_staleness_secs")]
    pub staleness_bound_secs: u64,
}

fn default_staleness_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverCredentials {
    pub path: Option<String>,
    #[serde(default)]
    pub extra: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IamConfig {
    #[serde(default = "default_memo_ttl_ms")]
    pub memoization_ttl_ms: u64,
    pub bootstrap_admin_user_id: String,
}

fn default_memo_ttl_ms() -> u64 {
    250
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,
    #[serde(default = "default_backoff_cap_secs")]
    pub backoff_cap_secs: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_backoff_base_secs() -> u64 {
    1
}

fn default_backoff_cap_secs() -> u64 {
    60
}

/// Load configuration from a YAML file. There is no directory-scan variant —
/// unlike the manifest parser this configuration layer is not in the
/// business of expanding user-authored element trees, it just deserializes
/// one settings document.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    debug!(path = %path.display(), "loading config");
    let config: Config = serde_yaml::from_str(&content).map_err(|e| ConfigError::YamlParse {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
db:
  connection_url: "redb://./genesis.redb"
universal_agent:
  orch_endpoint: "http://localhost:8080/v1/orch"
  status_endpoint: "http://localhost:8080/v1/status"
  caps_drivers: ["dummy_compute", "password", "certificate"]
universal_agent_scheduler:
  capabilities: ["em_core_*", "password", "certificate"]
iam:
  bootstrap_admin_user_id: "00000000-0000-0000-0000-000000000000"
events:
  max_attempts: 3
"#
    }

    #[test]
    fn parses_minimal_config_with_defaults() {
        let config: Config = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(config.db.connection_pool_size, 8);
        assert_eq!(config.universal_agent.poll_period_secs, 10);
        assert_eq!(config.iam.memoization_ttl_ms, 250);
        assert_eq!(config.events.max_attempts, 3);
        assert_eq!(config.events.backoff_base_secs, 1);
    }

    #[test]
    fn load_reports_io_error_for_missing_file() {
        let err = load(Path::new("/nonexistent/genesis.yml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
