use serde::{Deserialize, Serialize};

use crate::envelope::EntityId;

/// An allocatable group of [`Node`]s behind a single driver. Driver kind is
/// immutable after creation — there is no setter for it, only the
/// constructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachinePool {
    pub name: String,
    pub driver_kind: MachinePoolDriverKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachinePoolDriverKind {
    Dummy,
    Libvirt,
}

impl MachinePool {
    pub fn new(name: impl Into<String>, driver_kind: MachinePoolDriverKind) -> Self {
        Self { name: name.into(), driver_kind }
    }
}

/// A managed host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub hardware: HardwareProfile,
    pub machine_pool_id: EntityId,
    pub image_ref: String,
    /// Weak references — enforced by the storage adapter at write time, not
    /// held as in-memory back-pointers.
    pub interface_ids: Vec<EntityId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareProfile {
    pub cpu: u32,
    pub ram_mb: u64,
    pub disk_size_gb: u64,
}
