//! Attribute policy administration. Versions are append-only; at most one
//! is active at a time.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use portcullis_core::id::EntityId;
use portcullis_core::models::policy::{CreatePolicy, NewPolicyVersion, Policy};
use portcullis_core::repository::PaginatedResult;
use surrealdb::Connection;

use crate::api::PageQuery;
use crate::api::error::{ApiError, json_body};
use crate::app::AppState;

pub async fn create_policy<C: Connection>(
    State(state): State<AppState<C>>,
    Path(org_id): Path<EntityId>,
    payload: Result<Json<CreatePolicy>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let policy = state
        .store
        .create_policy(org_id, json_body(payload)?)
        .await?;
    Ok((StatusCode::CREATED, Json(policy)))
}

pub async fn list_policies<C: Connection>(
    State(state): State<AppState<C>>,
    Path(org_id): Path<EntityId>,
    Query(page): Query<PageQuery>,
) -> Result<Json<PaginatedResult<Policy>>, ApiError> {
    Ok(Json(state.store.list_policies(org_id, page.into()).await?))
}

pub async fn get_policy<C: Connection>(
    State(state): State<AppState<C>>,
    Path((org_id, policy_id)): Path<(EntityId, EntityId)>,
) -> Result<Json<Policy>, ApiError> {
    Ok(Json(state.store.get_policy(org_id, policy_id).await?))
}

pub async fn add_policy_version<C: Connection>(
    State(state): State<AppState<C>>,
    Path((org_id, policy_id)): Path<(EntityId, EntityId)>,
    payload: Result<Json<NewPolicyVersion>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let policy = state
        .store
        .add_policy_version(org_id, policy_id, json_body(payload)?)
        .await?;
    Ok((StatusCode::CREATED, Json(policy)))
}

pub async fn activate_policy_version<C: Connection>(
    State(state): State<AppState<C>>,
    Path((org_id, policy_id, revision)): Path<(EntityId, EntityId, u32)>,
) -> Result<Json<Policy>, ApiError> {
    let policy = state
        .store
        .activate_policy_version(org_id, policy_id, revision)
        .await?;
    Ok(Json(policy))
}

/// Also detaches the policy from every user and role.
pub async fn delete_policy<C: Connection>(
    State(state): State<AppState<C>>,
    Path((org_id, policy_id)): Path<(EntityId, EntityId)>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_policy(org_id, policy_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
