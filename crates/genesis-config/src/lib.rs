pub mod config;
pub mod error;

pub use config::{
    load, AgentEndpoints, Config, DbConfig, DriverCredentials, EventsConfig, IamConfig,
    SchedulerConfig,
};
pub use error::ConfigError;
