use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use portcullis_core::id::EntityId;
use portcullis_core::models::resource::{
    CreateResource, PatchResource, Resource, UpdateResource,
};
use portcullis_core::repository::PaginatedResult;
use surrealdb::Connection;

use crate::api::PageQuery;
use crate::api::error::{ApiError, json_body};
use crate::app::AppState;

pub async fn create_resource<C: Connection>(
    State(state): State<AppState<C>>,
    Path(org_id): Path<EntityId>,
    payload: Result<Json<CreateResource>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let resource = state.store.create_resource(org_id, json_body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(resource)))
}

pub async fn list_resources<C: Connection>(
    State(state): State<AppState<C>>,
    Path(org_id): Path<EntityId>,
    Query(page): Query<PageQuery>,
) -> Result<Json<PaginatedResult<Resource>>, ApiError> {
    Ok(Json(state.store.list_resources(org_id, page.into()).await?))
}

pub async fn get_resource<C: Connection>(
    State(state): State<AppState<C>>,
    Path((org_id, resource_id)): Path<(EntityId, EntityId)>,
) -> Result<Json<Resource>, ApiError> {
    Ok(Json(state.store.get_resource(org_id, resource_id).await?))
}

pub async fn update_resource<C: Connection>(
    State(state): State<AppState<C>>,
    Path((org_id, resource_id)): Path<(EntityId, EntityId)>,
    payload: Result<Json<UpdateResource>, JsonRejection>,
) -> Result<Json<Resource>, ApiError> {
    let input = json_body(payload)?;
    Ok(Json(state.store.update_resource(org_id, resource_id, input).await?))
}

/// Adds and removes actions on the resource.
pub async fn patch_resource<C: Connection>(
    State(state): State<AppState<C>>,
    Path((org_id, resource_id)): Path<(EntityId, EntityId)>,
    payload: Result<Json<PatchResource>, JsonRejection>,
) -> Result<Json<Resource>, ApiError> {
    let patch = json_body(payload)?;
    Ok(Json(state.store.patch_resource(org_id, resource_id, patch).await?))
}

pub async fn delete_resource<C: Connection>(
    State(state): State<AppState<C>>,
    Path((org_id, resource_id)): Path<(EntityId, EntityId)>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_resource(org_id, resource_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
