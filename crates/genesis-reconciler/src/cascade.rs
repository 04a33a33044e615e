use futures::future::{BoxFuture, FutureExt};
use genesis_domain::{EntityId, EntityKind};
use genesis_store::{now, ResourceStore, ScanFilter};
use tracing::debug;

use crate::error::ReconcileError;

/// Parent/child containment edges driving cascading deletion: `(parent
/// kind, child kind, field on the child's spec holding the parent's id)`.
/// `BackendPool` is deliberately absent as a child of `Route` — a pool may
/// be shared across routes, so it is never cascade-deleted.
const CASCADE_EDGES: &[(EntityKind, EntityKind, &str)] = &[
    (EntityKind::Network, EntityKind::Subnet, "network_id"),
    (EntityKind::Subnet, EntityKind::Interface, "subnet_id"),
    (EntityKind::Node, EntityKind::Interface, "node_id"),
    (EntityKind::MachinePool, EntityKind::Node, "machine_pool_id"),
    (EntityKind::LoadBalancer, EntityKind::Vhost, "load_balancer_id"),
    (EntityKind::Vhost, EntityKind::Route, "vhost_id"),
    (EntityKind::Service, EntityKind::ServiceNode, "service_id"),
];

/// Marks `DELETING` on a parent and every transitive dependent, children
/// before parents (depth-first post-order), so an agent never tears down a
/// parent's driver state while a dependent still expects it to exist.
/// Returns every `(kind, id)` marked, in the order they were marked.
pub async fn cascade_delete(
    store: &dyn ResourceStore,
    parent_kind: EntityKind,
    parent_id: EntityId,
) -> Result<Vec<(EntityKind, EntityId)>, ReconcileError> {
    let mut marked = Vec::new();
    mark_deleting_recursive(store, parent_kind, parent_id, &mut marked).await?;
    Ok(marked)
}

fn mark_deleting_recursive<'a>(
    store: &'a dyn ResourceStore,
    kind: EntityKind,
    id: EntityId,
    marked: &'a mut Vec<(EntityKind, EntityId)>,
) -> BoxFuture<'a, Result<(), ReconcileError>> {
    async move {
        for (parent_kind, child_kind, field) in CASCADE_EDGES.iter().filter(|(pk, _, _)| *pk == kind) {
            let children = store.list(*child_kind, None, ScanFilter::default()).await?;
            for child in children {
                let references_parent =
                    child.spec.get(*field).and_then(|v| v.as_str()) == Some(id.to_string().as_str());
                if references_parent {
                    mark_deleting_recursive(store, *child_kind, child.envelope.id, marked).await?;
                }
            }
            let _ = parent_kind;
        }

        if let Some(mut entity) = store.get(kind, id).await? {
            if entity.envelope.status != genesis_domain::Status::Deleting {
                debug!(kind = ?kind, id = %id, "cascade: marking deleting");
                let original_version = entity.envelope.version;
                entity.envelope.mark_deleting(now());
                store.upsert_target(kind, entity, Some(original_version)).await?;
            }
            marked.push((kind, id));
        }
        Ok(())
    }
    .boxed()
}

/// True if any direct dependent of `kind`/`id` (per `CASCADE_EDGES`) still
/// physically exists in the store, in any status. A `DELETING` parent's
/// own row must not be physically removed while this is true — dependents
/// of a different kind are torn down by their own kind's worker on a later
/// tick, and only once every one of them is actually gone does "every
/// dependent is gone" (§3) hold for the parent.
pub async fn has_remaining_children(
    store: &dyn ResourceStore,
    kind: EntityKind,
    id: EntityId,
) -> Result<bool, ReconcileError> {
    for (_, child_kind, field) in CASCADE_EDGES.iter().filter(|(pk, _, _)| *pk == kind) {
        let children = store.list(*child_kind, None, ScanFilter::default()).await?;
        let still_referenced = children
            .iter()
            .any(|child| child.spec.get(*field).and_then(|v| v.as_str()) == Some(id.to_string().as_str()));
        if still_referenced {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use genesis_domain::{Envelope, ProjectId, Status};
    use genesis_store::{InMemoryResourceStore, StoredEntity};
    use serde_json::json;

    fn envelope(project_id: ProjectId) -> Envelope {
        let now = Utc::now();
        Envelope {
            id: EntityId::new_v4(),
            project_id,
            created_at: now,
            updated_at: now,
            version: 1,
            status: Status::Active,
            claimed_until: None,
            attempt_count: 0,
        }
    }

    #[tokio::test]
    async fn cascades_network_through_subnet_to_interface() {
        let store = InMemoryResourceStore::new();
        let project_id = ProjectId::new_v4();

        let network_id = EntityId::new_v4();
        let mut network = StoredEntity::new(envelope(project_id), json!({"name": "n1"}));
        network.envelope.id = network_id;
        store.upsert_target(EntityKind::Network, network, None).await.unwrap();

        let subnet_id = EntityId::new_v4();
        let mut subnet = StoredEntity::new(envelope(project_id), json!({"network_id": network_id, "cidr": "10.0.0.0/24"}));
        subnet.envelope.id = subnet_id;
        store.upsert_target(EntityKind::Subnet, subnet, None).await.unwrap();

        let interface_id = EntityId::new_v4();
        let mut interface = StoredEntity::new(
            envelope(project_id),
            json!({"node_id": EntityId::new_v4(), "subnet_id": subnet_id}),
        );
        interface.envelope.id = interface_id;
        store.upsert_target(EntityKind::Interface, interface, None).await.unwrap();

        let marked = cascade_delete(&store, EntityKind::Network, network_id).await.unwrap();

        // Children must be marked before the parent.
        let interface_pos = marked.iter().position(|(k, i)| *k == EntityKind::Interface && *i == interface_id).unwrap();
        let subnet_pos = marked.iter().position(|(k, i)| *k == EntityKind::Subnet && *i == subnet_id).unwrap();
        let network_pos = marked.iter().position(|(k, i)| *k == EntityKind::Network && *i == network_id).unwrap();
        assert!(interface_pos < subnet_pos);
        assert!(subnet_pos < network_pos);

        let stored_interface = store.get(EntityKind::Interface, interface_id).await.unwrap().unwrap();
        assert_eq!(stored_interface.envelope.status, Status::Deleting);
    }

    #[tokio::test]
    async fn parent_with_no_children_just_marks_itself() {
        let store = InMemoryResourceStore::new();
        let project_id = ProjectId::new_v4();
        let lb_id = EntityId::new_v4();
        let mut lb = StoredEntity::new(envelope(project_id), json!({"name": "lb1"}));
        lb.envelope.id = lb_id;
        store.upsert_target(EntityKind::LoadBalancer, lb, None).await.unwrap();

        let marked = cascade_delete(&store, EntityKind::LoadBalancer, lb_id).await.unwrap();
        assert_eq!(marked, vec![(EntityKind::LoadBalancer, lb_id)]);
    }

    #[tokio::test]
    async fn has_remaining_children_true_until_child_is_physically_gone() {
        let store = InMemoryResourceStore::new();
        let project_id = ProjectId::new_v4();

        let lb_id = EntityId::new_v4();
        let mut lb = StoredEntity::new(envelope(project_id), json!({"name": "lb1"}));
        lb.envelope.id = lb_id;
        store.upsert_target(EntityKind::LoadBalancer, lb, None).await.unwrap();

        let vhost_id = EntityId::new_v4();
        let mut vhost = StoredEntity::new(envelope(project_id), json!({"load_balancer_id": lb_id, "protocol": "http", "port": 80}));
        vhost.envelope.id = vhost_id;
        store.upsert_target(EntityKind::Vhost, vhost, None).await.unwrap();

        assert!(has_remaining_children(&store, EntityKind::LoadBalancer, lb_id).await.unwrap());

        store.delete(EntityKind::Vhost, vhost_id).await.unwrap();
        assert!(!has_remaining_children(&store, EntityKind::LoadBalancer, lb_id).await.unwrap());
    }
}
