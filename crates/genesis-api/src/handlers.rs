use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use genesis_domain::{Envelope, EntityId, EntityKind, PermissionTriple, ProjectId, RoleBinding};
use genesis_store::{ScanFilter, StoredEntity};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::{AppState, Subject};

fn permission(triple: &str) -> PermissionTriple {
    PermissionTriple::parse(triple).expect("static permission literal is well-formed")
}

// ── Health ──────────────────────────────────────────────────────────────────

pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ── Nodes ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateNodeBody {
    pub project_id: ProjectId,
    pub spec: Value,
}

pub async fn list_nodes(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let nodes = state.store.list(EntityKind::Node, None, ScanFilter::default()).await?;
    Ok(Json(json!(nodes)))
}

pub async fn get_node(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<Json<Value>, ApiError> {
    let node = state
        .store
        .get(EntityKind::Node, EntityId(id))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("node '{id}' not found")))?;
    Ok(Json(json!(node)))
}

pub async fn create_node(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Json(body): Json<CreateNodeBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    state.iam.check(subject.0, Some(body.project_id), &permission("em_core.nodes.create")).await?;
    let envelope = Envelope::new(body.project_id, Utc::now());
    let entity = StoredEntity::new(envelope, body.spec);
    let stored = state.store.upsert_target(EntityKind::Node, entity, None).await?;
    Ok((StatusCode::CREATED, Json(json!(stored))))
}

pub async fn delete_node(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(id): Path<uuid::Uuid>,
) -> Result<StatusCode, ApiError> {
    let id = EntityId(id);
    let mut entity = state
        .store
        .get(EntityKind::Node, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("node '{id}' not found")))?;
    state.iam.check(subject.0, Some(entity.envelope.project_id), &permission("em_core.nodes.delete")).await?;
    let expected_version = entity.envelope.version;
    entity.envelope.mark_deleting(Utc::now());
    state.store.upsert_target(EntityKind::Node, entity, Some(expected_version)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── IAM role bindings ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateRoleBindingBody {
    pub project_id: ProjectId,
    pub user_id: EntityId,
    pub role_id: EntityId,
    pub scope_project_id: Option<ProjectId>,
}

pub async fn list_role_bindings(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let bindings = state.store.list(EntityKind::RoleBinding, None, ScanFilter::default()).await?;
    Ok(Json(json!(bindings)))
}

pub async fn create_role_binding(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Json(body): Json<CreateRoleBindingBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    state.iam.check(subject.0, Some(body.project_id), &permission("iam.role_bindings.create")).await?;
    let binding = RoleBinding { user_id: body.user_id, role_id: body.role_id, project_id: body.scope_project_id };
    let spec = serde_json::to_value(&binding)
        .map_err(|e| ApiError::new(genesis_domain::ErrorKind::Validation, e.to_string()))?;
    let envelope = Envelope::new(body.project_id, Utc::now());
    let entity = StoredEntity::new(envelope, spec);
    let stored = state.store.upsert_target(EntityKind::RoleBinding, entity, None).await?;
    state.iam.invalidate_all();
    Ok((StatusCode::CREATED, Json(json!(stored))))
}

pub async fn delete_role_binding(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(id): Path<uuid::Uuid>,
) -> Result<StatusCode, ApiError> {
    let id = EntityId(id);
    let entity = state
        .store
        .get(EntityKind::RoleBinding, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("role binding '{id}' not found")))?;
    state.iam.check(subject.0, Some(entity.envelope.project_id), &permission("iam.role_bindings.delete")).await?;
    state.store.delete(EntityKind::RoleBinding, id).await?;
    state.iam.invalidate_all();
    Ok(StatusCode::NO_CONTENT)
}
