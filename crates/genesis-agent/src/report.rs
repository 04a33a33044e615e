use genesis_domain::EntityKind;

/// Tally of what one `poll_once` call did, per kind and in aggregate —
/// returned for logging and for integration tests asserting convergence
/// without inspecting store internals.
#[derive(Debug, Default, Clone)]
pub struct AgentTickReport {
    pub per_kind: Vec<KindTickReport>,
}

#[derive(Debug, Default, Clone)]
pub struct KindTickReport {
    pub kind: Option<EntityKind>,
    pub created: u32,
    pub updated: u32,
    pub deleted: u32,
    pub unchanged: u32,
    pub transient_failures: u32,
    pub permanent_failures: u32,
}

impl AgentTickReport {
    pub fn total_changes(&self) -> u32 {
        self.per_kind.iter().map(|k| k.created + k.updated + k.deleted).sum()
    }

    pub fn total_failures(&self) -> u32 {
        self.per_kind.iter().map(|k| k.transient_failures + k.permanent_failures).sum()
    }
}
