use chrono::{DateTime, Utc};
use genesis_domain::Envelope;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A stored entity: the kind-agnostic envelope plus an opaque spec blob.
/// The store never deserializes `spec` into a concrete type — schema is
/// declared and validated by the caller (the driver or reconciler), per the
/// storage adapter being "otherwise agnostic to entity kind".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntity {
    pub envelope: Envelope,
    pub spec: serde_json::Value,
}

impl StoredEntity {
    pub fn new(envelope: Envelope, spec: serde_json::Value) -> Self {
        Self { envelope, spec }
    }

    /// Canonical-JSON SHA-256 of `spec`, used for cheap drift/no-op
    /// detection alongside (not instead of) the explicit version counter.
    pub fn spec_hash(&self) -> String {
        let sorted = sort_json_keys(&self.spec);
        let bytes = serde_json::to_vec(&sorted).unwrap_or_default();
        let digest = Sha256::digest(&bytes);
        hex::encode(digest)
    }
}

fn sort_json_keys(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for k in keys {
                sorted.insert(k.clone(), sort_json_keys(&map[k]));
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(sort_json_keys).collect())
        }
        other => other.clone(),
    }
}

/// Minimal local hex encoder — avoids pulling in the `hex` crate for a
/// single digest-to-string conversion.
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// A filter for `list`/`scan_*` queries. Kept intentionally small: the
/// storage adapter only needs to answer the three query shapes named in the
/// specification, not a general query language.
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    pub parent_id: Option<Uuid>,
}

/// Closed enumeration of domain event kinds the outbox carries. Matches the
/// specification's examples (`IamUserRegistration`, `IamUserResetPassword`)
/// plus the reconciliation lifecycle events the agent/orchestrator need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    IamUserRegistration,
    IamUserResetPassword,
    CertificateIssued,
    TargetReachedActive,
    TargetEnteredError,
}

/// An event committed to the durable outbox in the same transaction as the
/// mutation that produced it. Payloads are versioned structured records,
/// never free-form strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: Uuid,
    pub kind: EventKind,
    pub payload: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
    pub attempts: u32,
}

impl OutboxEvent {
    pub fn new(kind: EventKind, payload: serde_json::Value, now: DateTime<Utc>) -> Self {
        Self { id: Uuid::new_v4(), kind, payload, recorded_at: now, attempts: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genesis_domain::{EntityId, ProjectId, Status};
    use serde_json::json;

    fn envelope() -> Envelope {
        Envelope {
            id: EntityId::new_v4(),
            project_id: ProjectId::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            version: 1,
            status: Status::New,
            claimed_until: None,
            attempt_count: 0,
        }
    }

    #[test]
    fn spec_hash_is_key_order_independent() {
        let a = StoredEntity::new(envelope(), json!({"a": 1, "b": 2}));
        let b = StoredEntity::new(a.envelope.clone(), json!({"b": 2, "a": 1}));
        assert_eq!(a.spec_hash(), b.spec_hash());
    }

    #[test]
    fn spec_hash_changes_with_content() {
        let a = StoredEntity::new(envelope(), json!({"a": 1}));
        let b = StoredEntity::new(a.envelope.clone(), json!({"a": 2}));
        assert_ne!(a.spec_hash(), b.spec_hash());
    }
}
