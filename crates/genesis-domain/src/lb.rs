use serde::{Deserialize, Serialize};

use crate::envelope::EntityId;
use crate::error::DomainError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Http,
    Https,
    Tcp,
    Udp,
}

/// Containment: a Vhost belongs to exactly one LoadBalancer via `load_balancer_id`.
/// Uniqueness invariant (protocol, port) per LB is enforced by the storage
/// adapter at write time, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vhost {
    pub load_balancer_id: EntityId,
    pub protocol: Protocol,
    pub port: u16,
}

/// Containment: a Route belongs to exactly one Vhost via `vhost_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub vhost_id: EntityId,
    pub backend_pool_id: EntityId,
    pub condition: RouteCondition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "condition_type", rename_all = "snake_case")]
pub enum RouteCondition {
    Prefix { path: String },
    Exact { path: String },
    Regex { pattern: String },
    Raw { matcher: String },
}

impl Route {
    /// `raw` conditions only make sense on a layer-4 (tcp/udp) vhost; layer-7
    /// conditions (prefix/exact/regex path matching) only make sense on http(s).
    pub fn validate_condition(condition: &RouteCondition, protocol: Protocol) -> Result<(), DomainError> {
        let ok = match condition {
            RouteCondition::Raw { .. } => matches!(protocol, Protocol::Tcp | Protocol::Udp),
            _ => matches!(protocol, Protocol::Http | Protocol::Https),
        };
        if ok {
            Ok(())
        } else {
            Err(DomainError::InvalidConfig(format!(
                "route condition {condition:?} is not legal on protocol {protocol:?}"
            )))
        }
    }
}

/// Containment: a BackendPool is referenced by one-or-more Routes; it does
/// not itself reference its parent (a pool may be shared).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendPool {
    pub name: String,
    pub node_ids: Vec<EntityId>,
    pub port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_condition_legal_on_tcp() {
        assert!(Route::validate_condition(&RouteCondition::Raw { matcher: "x".into() }, Protocol::Tcp).is_ok());
    }

    #[test]
    fn raw_condition_illegal_on_http() {
        assert!(Route::validate_condition(&RouteCondition::Raw { matcher: "x".into() }, Protocol::Http).is_err());
    }

    #[test]
    fn prefix_condition_illegal_on_udp() {
        assert!(Route::validate_condition(&RouteCondition::Prefix { path: "/".into() }, Protocol::Udp).is_err());
    }
}
