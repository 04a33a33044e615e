use serde::{Deserialize, Serialize};

/// A managed password secret. `material` is opaque here — the capability
/// driver owns generation/rotation; the domain type only carries the
/// envelope-addressable metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Password {
    pub owner_ref: String,
    pub length: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub common_name: String,
    pub subject_alt_names: Vec<String>,
    pub validity_days: u32,
}
