use std::collections::HashMap;
use std::sync::Arc;

use genesis_domain::EntityKind;

use crate::driver::CapabilityDriver;
use crate::error::DriverError;

/// Dispatches driver calls to the correct [`CapabilityDriver`] for a given
/// [`EntityKind`]. Direct generalization of this workspace's cloud-keyed
/// registry: the key is now a closed compile-time kind rather than a
/// string-keyed cloud target, per the "dynamic resource kinds ... become a
/// closed, compile-time enumeration" design note.
#[derive(Default)]
pub struct DriverRegistry {
    drivers: HashMap<EntityKind, Arc<dyn CapabilityDriver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self { drivers: HashMap::new() }
    }

    /// Register a driver for every kind it advertises via
    /// `supported_kinds()`. Returns `&mut self` for chaining.
    pub fn register(&mut self, driver: Arc<dyn CapabilityDriver>) -> &mut Self {
        for kind in driver.supported_kinds() {
            self.drivers.insert(*kind, driver.clone());
        }
        self
    }

    pub fn for_kind(&self, kind: EntityKind) -> Result<Arc<dyn CapabilityDriver>, DriverError> {
        self.drivers.get(&kind).cloned().ok_or(DriverError::DriverNotConfigured(kind))
    }

    /// Every kind with a registered driver — advertised on agent registration.
    pub fn supported_kinds(&self) -> Vec<EntityKind> {
        let mut kinds: Vec<EntityKind> = self.drivers.keys().copied().collect();
        kinds.sort_by_key(|k| k.to_string());
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dummy::DummyComputeDriver;

    #[test]
    fn register_advertises_all_supported_kinds() {
        let mut registry = DriverRegistry::new();
        registry.register(Arc::new(DummyComputeDriver::new()));
        assert!(registry.for_kind(EntityKind::Node).is_ok());
        assert!(registry.for_kind(EntityKind::MachinePool).is_ok());
    }

    #[test]
    fn unregistered_kind_is_driver_not_configured() {
        let registry = DriverRegistry::new();
        let err = registry.for_kind(EntityKind::Password).unwrap_err();
        assert!(matches!(err, DriverError::DriverNotConfigured(EntityKind::Password)));
    }
}
