use genesis_domain::{EntityId, EntityKind};
use serde::{Deserialize, Serialize};

/// Kept in the same tagged-enum shape as this codebase's per-entity-type
/// `Change` list, generalized from one variant per concrete entity type to
/// one kind-parametric variant set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Change {
    Created { kind: EntityKind, id: EntityId },
    Updated { kind: EntityKind, id: EntityId },
    Deleted { kind: EntityKind, id: EntityId },
    MarkedError { kind: EntityKind, id: EntityId, reason: String },
    Deferred { kind: EntityKind, id: EntityId, reason: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub changes: Vec<Change>,
    pub errors: Vec<String>,
}

impl ReconcileReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, other: ReconcileReport) {
        self.changes.extend(other.changes);
        self.errors.extend(other.errors);
    }
}
