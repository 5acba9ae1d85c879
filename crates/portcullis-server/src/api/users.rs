//! User administration. Role and group links are kept on both sides.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use portcullis_core::id::EntityId;
use portcullis_core::models::user::{CreateUser, PatchUser, UpdateUser, User};
use portcullis_core::repository::{PaginatedResult, Pagination};
use serde::Deserialize;
use surrealdb::Connection;

use crate::api::PageQuery;
use crate::api::error::{ApiError, json_body};
use crate::app::AppState;

pub async fn create_user<C: Connection>(
    State(state): State<AppState<C>>,
    Path(org_id): Path<EntityId>,
    payload: Result<Json<CreateUser>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.store.create_user(org_id, json_body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// `?username=` narrows the listing to that one user, or 404.
#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
    pub username: Option<String>,
}

pub async fn list_users<C: Connection>(
    State(state): State<AppState<C>>,
    Path(org_id): Path<EntityId>,
    Query(query): Query<UserQuery>,
) -> Result<Json<PaginatedResult<User>>, ApiError> {
    let page: Pagination = PageQuery {
        offset: query.offset,
        limit: query.limit,
    }
    .into();
    let Some(username) = query.username else {
        return Ok(Json(state.store.list_users(org_id, page).await?));
    };
    let user = state.store.get_user_by_username(org_id, &username).await?;
    Ok(Json(PaginatedResult {
        items: vec![user],
        total: 1,
        offset: 0,
        limit: page.limit,
    }))
}

pub async fn get_user<C: Connection>(
    State(state): State<AppState<C>>,
    Path((org_id, user_id)): Path<(EntityId, EntityId)>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.store.get_user(org_id, user_id).await?))
}

pub async fn update_user<C: Connection>(
    State(state): State<AppState<C>>,
    Path((org_id, user_id)): Path<(EntityId, EntityId)>,
    payload: Result<Json<UpdateUser>, JsonRejection>,
) -> Result<Json<User>, ApiError> {
    let input = json_body(payload)?;
    Ok(Json(state.store.update_user(org_id, user_id, input).await?))
}

/// Adds and removals of roles, groups, and policies. Removing a link
/// the user does not have is a no-op.
pub async fn patch_user<C: Connection>(
    State(state): State<AppState<C>>,
    Path((org_id, user_id)): Path<(EntityId, EntityId)>,
    payload: Result<Json<PatchUser>, JsonRejection>,
) -> Result<Json<User>, ApiError> {
    let patch = json_body(payload)?;
    Ok(Json(state.store.patch_user(org_id, user_id, patch).await?))
}

/// Also detaches the user from every role and group that lists it.
pub async fn delete_user<C: Connection>(
    State(state): State<AppState<C>>,
    Path((org_id, user_id)): Path<(EntityId, EntityId)>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_user(org_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
