use std::time::Duration;

use genesis_config::Config;

/// Agent-local configuration sourced from the shared [`Config`] plus the
/// identity/credential values only this process knows (its own node name,
/// the static credential it authenticates with).
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub agent_id: String,
    pub poll_period: Duration,
    pub jitter_fraction: f64,
    pub credential: String,
    pub token_ttl_secs: i64,
    pub max_retries_per_tick: u32,
}

impl AgentConfig {
    pub fn from_config(config: &Config, agent_id: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            poll_period: Duration::from_secs(config.universal_agent.poll_period_secs),
            jitter_fraction: config.universal_agent.jitter_fraction,
            credential: credential.into(),
            token_ttl_secs: 3600,
            max_retries_per_tick: 3,
        }
    }

    /// Jittered sleep duration for the poll loop: `poll_period * (1 +-
    /// jitter_fraction)`, mirroring the backoff helper's jitter shape.
    pub fn jittered_poll_delay(&self, jitter: f64) -> Duration {
        let base = self.poll_period.as_secs_f64();
        let jittered = (base * (1.0 + jitter.clamp(-self.jitter_fraction, self.jitter_fraction))).max(0.0);
        Duration::from_secs_f64(jittered)
    }
}
