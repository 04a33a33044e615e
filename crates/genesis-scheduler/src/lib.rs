pub mod capability;
pub mod error;
pub mod scheduler;

pub use capability::{capability_kind, AgentHandle, AgentId, CapabilityLabel};
pub use error::SchedulerError;
pub use scheduler::Scheduler;
