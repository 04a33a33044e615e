use std::collections::HashMap;
use std::sync::Arc;

use axum::middleware;
use axum::routing::{delete, get};
use axum::Router;
use genesis_domain::EntityId;
use genesis_driver::DriverRegistry;
use genesis_iam::IamKernel;
use genesis_store::ResourceStore;
use tower_http::trace::TraceLayer;

use crate::auth::require_bearer_token;
use crate::handlers;
use crate::state::AppState;

/// A thin illustrative slice of this system's representative HTTP surface —
/// enough to drive integration tests through real HTTP, not a deliverable
/// CRUD layer in its own right.
pub fn build_app(
    store: Arc<dyn ResourceStore>,
    registry: Arc<DriverRegistry>,
    iam: Arc<IamKernel>,
    auth_tokens: Arc<HashMap<String, EntityId>>,
) -> Router {
    let state = AppState { store, registry, iam, auth_tokens };

    Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/nodes", get(handlers::list_nodes).post(handlers::create_node))
        .route("/v1/nodes/:id", get(handlers::get_node).delete(handlers::delete_node))
        .route(
            "/v1/iam/role_bindings",
            get(handlers::list_role_bindings).post(handlers::create_role_binding),
        )
        .route("/v1/iam/role_bindings/:id", delete(handlers::delete_role_binding))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer_token))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use genesis_domain::{Envelope, EntityKind, Permission, PermissionBinding, PermissionTriple, ProjectId, Role, RoleBinding};
    use genesis_driver::DummyComputeDriver;
    use genesis_store::{InMemoryResourceStore, StoredEntity};
    use serde_json::json;
    use tower::util::ServiceExt;

    const TEST_TOKEN: &str = "test-token";
    const ADMIN_TOKEN: &str = "admin-token";

    struct TestApp {
        router: Router,
        store: Arc<dyn ResourceStore>,
        plain_user: EntityId,
    }

    fn test_app() -> TestApp {
        let store: Arc<dyn ResourceStore> = Arc::new(InMemoryResourceStore::new());
        let mut registry = DriverRegistry::new();
        registry.register(Arc::new(DummyComputeDriver::new()));
        let registry = Arc::new(registry);
        let admin_user = EntityId::new_v4();
        let plain_user = EntityId::new_v4();
        let iam = Arc::new(IamKernel::new(store.clone(), admin_user, 250));

        let mut auth_tokens = HashMap::new();
        auth_tokens.insert(TEST_TOKEN.to_string(), plain_user);
        auth_tokens.insert(ADMIN_TOKEN.to_string(), admin_user);

        let router = build_app(store.clone(), registry, iam, Arc::new(auth_tokens));
        TestApp { router, store, plain_user }
    }

    fn authed(req: axum::http::request::Builder) -> axum::http::request::Builder {
        req.header("Authorization", format!("Bearer {TEST_TOKEN}"))
    }

    fn as_admin(req: axum::http::request::Builder) -> axum::http::request::Builder {
        req.header("Authorization", format!("Bearer {ADMIN_TOKEN}"))
    }

    /// Grants `user` the permission `em_core.nodes.create` project-wide, the
    /// same chain `IamKernel::resolve` walks: Role -> PermissionBinding ->
    /// Permission, and User -> RoleBinding -> Role.
    async fn grant_node_create(store: &Arc<dyn ResourceStore>, user: EntityId, project: ProjectId) {
        let now = Utc::now();
        let envelope = || Envelope::new(project, now);

        let role_id = EntityId::new_v4();
        let mut role = StoredEntity::new(envelope(), serde_json::to_value(Role { name: "editor".into() }).unwrap());
        role.envelope.id = role_id;
        store.upsert_target(EntityKind::Role, role, None).await.unwrap();

        let permission_id = EntityId::new_v4();
        let permission = Permission {
            name: PermissionTriple::parse("em_core.nodes.create").unwrap(),
            description: String::new(),
        };
        let mut perm_entity = StoredEntity::new(envelope(), serde_json::to_value(permission).unwrap());
        perm_entity.envelope.id = permission_id;
        store.upsert_target(EntityKind::Permission, perm_entity, None).await.unwrap();

        let pb = PermissionBinding { role_id, permission_id, project_id: Some(project) };
        let pb_entity = StoredEntity::new(envelope(), serde_json::to_value(pb).unwrap());
        store.upsert_target(EntityKind::PermissionBinding, pb_entity, None).await.unwrap();

        let rb = RoleBinding { user_id: user, role_id, project_id: Some(project) };
        let rb_entity = StoredEntity::new(envelope(), serde_json::to_value(rb).unwrap());
        store.upsert_target(EntityKind::RoleBinding, rb_entity, None).await.unwrap();
    }

    #[tokio::test]
    async fn unauthenticated_request_returns_401() {
        let app = test_app().router;
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_token_returns_401() {
        let app = test_app().router;
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("Authorization", "Bearer wrong-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn health_returns_200() {
        let app = test_app().router;
        let resp = app
            .oneshot(authed(Request::builder().uri("/health")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn nodes_empty_list() {
        let app = test_app().router;
        let resp = app
            .oneshot(authed(Request::builder().uri("/v1/nodes")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn node_not_found_returns_404() {
        let app = test_app().router;
        let resp = app
            .oneshot(
                authed(Request::builder().uri(format!("/v1/nodes/{}", uuid::Uuid::new_v4())))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn role_bindings_empty_list() {
        let app = test_app().router;
        let resp = app
            .oneshot(authed(Request::builder().uri("/v1/iam/role_bindings")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn create_node_without_permission_is_denied_and_writes_nothing() {
        let test_app = test_app();
        let body = json!({"project_id": ProjectId::new_v4(), "spec": {"name": "n1"}});
        let resp = test_app
            .router
            .oneshot(
                authed(Request::builder().method("POST").uri("/v1/nodes").header("content-type", "application/json"))
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let envelope: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(envelope["type"], "PermissionDeniedException");

        assert!(test_app.store.list(EntityKind::Node, None, genesis_store::ScanFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_node_succeeds_for_bootstrap_admin() {
        let test_app = test_app();
        let body = json!({"project_id": ProjectId::new_v4(), "spec": {"name": "n1"}});
        let resp = test_app
            .router
            .oneshot(
                as_admin(Request::builder().method("POST").uri("/v1/nodes").header("content-type", "application/json"))
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(test_app.store.list(EntityKind::Node, None, genesis_store::ScanFilter::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_node_succeeds_once_permission_is_granted() {
        let test_app = test_app();
        let project = ProjectId::new_v4();
        grant_node_create(&test_app.store, test_app.plain_user, project).await;

        let body = json!({"project_id": project, "spec": {"name": "n1"}});
        let resp = test_app
            .router
            .oneshot(
                authed(Request::builder().method("POST").uri("/v1/nodes").header("content-type", "application/json"))
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
    }
}
