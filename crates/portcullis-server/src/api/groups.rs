use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use portcullis_core::id::EntityId;
use portcullis_core::models::group::{CreateGroup, Group, PatchGroup, UpdateGroup};
use portcullis_core::repository::PaginatedResult;
use surrealdb::Connection;

use crate::api::PageQuery;
use crate::api::error::{ApiError, json_body};
use crate::app::AppState;

pub async fn create_group<C: Connection>(
    State(state): State<AppState<C>>,
    Path(org_id): Path<EntityId>,
    payload: Result<Json<CreateGroup>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let group = state.store.create_group(org_id, json_body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn list_groups<C: Connection>(
    State(state): State<AppState<C>>,
    Path(org_id): Path<EntityId>,
    Query(page): Query<PageQuery>,
) -> Result<Json<PaginatedResult<Group>>, ApiError> {
    Ok(Json(state.store.list_groups(org_id, page.into()).await?))
}

pub async fn get_group<C: Connection>(
    State(state): State<AppState<C>>,
    Path((org_id, group_id)): Path<(EntityId, EntityId)>,
) -> Result<Json<Group>, ApiError> {
    Ok(Json(state.store.get_group(org_id, group_id).await?))
}

pub async fn update_group<C: Connection>(
    State(state): State<AppState<C>>,
    Path((org_id, group_id)): Path<(EntityId, EntityId)>,
    payload: Result<Json<UpdateGroup>, JsonRejection>,
) -> Result<Json<Group>, ApiError> {
    let input = json_body(payload)?;
    Ok(Json(state.store.update_group(org_id, group_id, input).await?))
}

pub async fn patch_group<C: Connection>(
    State(state): State<AppState<C>>,
    Path((org_id, group_id)): Path<(EntityId, EntityId)>,
    payload: Result<Json<PatchGroup>, JsonRejection>,
) -> Result<Json<Group>, ApiError> {
    let patch = json_body(payload)?;
    Ok(Json(state.store.patch_group(org_id, group_id, patch).await?))
}

pub async fn delete_group<C: Connection>(
    State(state): State<AppState<C>>,
    Path((org_id, group_id)): Path<(EntityId, EntityId)>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_group(org_id, group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
