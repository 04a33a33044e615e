use genesis_domain::{DeploymentTarget, EntityId, Service, ServiceKind, ServiceNode, Target};

/// Flattens a service's [`DeploymentTarget`] into the concrete node ids it
/// names. `NodeSet` order is preserved as given; callers that need a
/// deterministic pick (monopoly election) sort/min independently.
pub fn resolve_node_ids(target: &DeploymentTarget) -> Vec<EntityId> {
    match target {
        DeploymentTarget::Node { node_id } => vec![*node_id],
        DeploymentTarget::NodeSet { node_ids } => node_ids.clone(),
    }
}

/// Projects a `Service` target onto the `ServiceNode`s the agent should
/// converge. `Simple`/`Oneshot` services get one `ServiceNode` per
/// candidate node; `Monopoly`/`MonopolyOneshot` services get exactly one,
/// placed on the lexicographically smallest candidate id so that every
/// orchestrator worker racing the same target converges on the same
/// placement without coordination.
pub fn fan_out(target: &Target<Service>) -> Vec<ServiceNode> {
    let node_ids = resolve_node_ids(&target.spec.target);
    let oneshot = target.spec.kind.is_oneshot();

    if target.spec.kind.is_monopoly() {
        node_ids
            .into_iter()
            .min()
            .map(|node_id| {
                vec![ServiceNode {
                    service_id: target.envelope.id,
                    node_id,
                    oneshot,
                }]
            })
            .unwrap_or_default()
    } else {
        node_ids
            .into_iter()
            .map(|node_id| ServiceNode {
                service_id: target.envelope.id,
                node_id,
                oneshot,
            })
            .collect()
    }
}
