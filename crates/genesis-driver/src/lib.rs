pub mod driver;
pub mod dummy;
pub mod error;
pub mod registry;
pub mod secret;

pub use driver::CapabilityDriver;
pub use dummy::DummyComputeDriver;
pub use error::DriverError;
pub use registry::DriverRegistry;
pub use secret::{CertificateDriver, PasswordDriver};

/// Opaque driver handle — any JSON value, matching [`genesis_store::StoredEntity::spec`].
pub type Handle = serde_json::Value;
