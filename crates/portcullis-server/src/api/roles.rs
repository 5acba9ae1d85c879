//! Role administration: membership, permissions, and attached policies.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use portcullis_core::id::EntityId;
use portcullis_core::models::role::{CreateRole, PatchRole, Role, UpdateRole};
use portcullis_core::repository::PaginatedResult;
use surrealdb::Connection;

use crate::api::PageQuery;
use crate::api::error::{ApiError, json_body};
use crate::app::AppState;

pub async fn create_role<C: Connection>(
    State(state): State<AppState<C>>,
    Path(org_id): Path<EntityId>,
    payload: Result<Json<CreateRole>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let role = state.store.create_role(org_id, json_body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

pub async fn list_roles<C: Connection>(
    State(state): State<AppState<C>>,
    Path(org_id): Path<EntityId>,
    Query(page): Query<PageQuery>,
) -> Result<Json<PaginatedResult<Role>>, ApiError> {
    Ok(Json(state.store.list_roles(org_id, page.into()).await?))
}

pub async fn get_role<C: Connection>(
    State(state): State<AppState<C>>,
    Path((org_id, role_id)): Path<(EntityId, EntityId)>,
) -> Result<Json<Role>, ApiError> {
    Ok(Json(state.store.get_role(org_id, role_id).await?))
}

pub async fn update_role<C: Connection>(
    State(state): State<AppState<C>>,
    Path((org_id, role_id)): Path<(EntityId, EntityId)>,
    payload: Result<Json<UpdateRole>, JsonRejection>,
) -> Result<Json<Role>, ApiError> {
    let input = json_body(payload)?;
    Ok(Json(state.store.update_role(org_id, role_id, input).await?))
}

pub async fn patch_role<C: Connection>(
    State(state): State<AppState<C>>,
    Path((org_id, role_id)): Path<(EntityId, EntityId)>,
    payload: Result<Json<PatchRole>, JsonRejection>,
) -> Result<Json<Role>, ApiError> {
    let patch = json_body(payload)?;
    Ok(Json(state.store.patch_role(org_id, role_id, patch).await?))
}

/// Also removes the role from every member.
pub async fn delete_role<C: Connection>(
    State(state): State<AppState<C>>,
    Path((org_id, role_id)): Path<(EntityId, EntityId)>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_role(org_id, role_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
