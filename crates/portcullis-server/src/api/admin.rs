//! Tenant administration: organizations, API keys, and repair replay.
//!
//! Every `/admin/v1` route passes through [`require_admin_token`]. When the
//! server runs without an admin token the whole surface answers 404.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use portcullis_core::id::EntityId;
use portcullis_core::models::api_key::{ApiKey, CreateApiKey};
use portcullis_core::models::organization::{
    CreateOrganization, OrganizationSummary, UpdateOrganization,
};
use portcullis_core::repository::PaginatedResult;
use serde::Serialize;
use surrealdb::Connection;
use tracing::warn;

use crate::api::PageQuery;
use crate::api::error::{ApiError, api_not_enabled, api_unauthorized, json_body};
use crate::app::AppState;

/// Header carrying the administration token.
pub const ADMIN_TOKEN_HEADER: &str = "X-Portcullis-Admin-Token";

pub async fn require_admin_token<C: Connection>(
    State(state): State<AppState<C>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Err(api_not_enabled("administration not enabled"));
    };
    let token = match headers.get(ADMIN_TOKEN_HEADER) {
        Some(value) => value
            .to_str()
            .map_err(|_| api_unauthorized("invalid admin token"))?,
        None => return Err(api_unauthorized("missing admin token")),
    };
    if !constant_time_eq(token.as_bytes(), expected.as_bytes()) {
        warn!(path = %request.uri().path(), "Rejected admin request");
        return Err(api_unauthorized("invalid admin token"));
    }
    Ok(next.run(request).await)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (left, right) in a.iter().zip(b.iter()) {
        diff |= left ^ right;
    }
    diff == 0
}

// ---------------------------------------------------------------------------
// Organizations
// ---------------------------------------------------------------------------

pub async fn create_organization<C: Connection>(
    State(state): State<AppState<C>>,
    payload: Result<Json<CreateOrganization>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let org = state
        .store
        .create_organization(json_body(payload)?)
        .await?;
    Ok((StatusCode::CREATED, Json(org.summary())))
}

pub async fn list_organizations<C: Connection>(
    State(state): State<AppState<C>>,
    Query(page): Query<PageQuery>,
) -> Result<Json<PaginatedResult<OrganizationSummary>>, ApiError> {
    Ok(Json(state.store.list_organizations(page.into()).await?))
}

pub async fn get_organization<C: Connection>(
    State(state): State<AppState<C>>,
    Path(org_id): Path<EntityId>,
) -> Result<Json<OrganizationSummary>, ApiError> {
    let org = state.store.get_organization(org_id).await?;
    Ok(Json(org.summary()))
}

pub async fn update_organization<C: Connection>(
    State(state): State<AppState<C>>,
    Path(org_id): Path<EntityId>,
    payload: Result<Json<UpdateOrganization>, JsonRejection>,
) -> Result<Json<OrganizationSummary>, ApiError> {
    let org = state
        .store
        .update_organization(org_id, json_body(payload)?)
        .await?;
    Ok(Json(org.summary()))
}

pub async fn delete_organization<C: Connection>(
    State(state): State<AppState<C>>,
    Path(org_id): Path<EntityId>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_organization(org_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// API keys
// ---------------------------------------------------------------------------

/// An API key as listed. The stored hash never leaves the server.
#[derive(Debug, Serialize)]
pub struct ApiKeyView {
    pub id: EntityId,
    pub name: String,
    pub prefix: String,
    pub created_at: DateTime<Utc>,
}

impl From<ApiKey> for ApiKeyView {
    fn from(key: ApiKey) -> Self {
        Self {
            id: key.id,
            name: key.name,
            prefix: key.prefix,
            created_at: key.created_at,
        }
    }
}

/// Returned once, at issue time.
#[derive(Debug, Serialize)]
pub struct IssuedApiKeyView {
    #[serde(flatten)]
    pub key: ApiKeyView,
    pub api_key: String,
}

pub async fn issue_api_key<C: Connection>(
    State(state): State<AppState<C>>,
    Path(org_id): Path<EntityId>,
    payload: Result<Json<CreateApiKey>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let issued = state
        .store
        .issue_api_key(org_id, json_body(payload)?)
        .await?;
    let body = IssuedApiKeyView {
        key: issued.api_key.into(),
        api_key: issued.raw_key,
    };
    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn list_api_keys<C: Connection>(
    State(state): State<AppState<C>>,
    Path(org_id): Path<EntityId>,
) -> Result<Json<Vec<ApiKeyView>>, ApiError> {
    let keys = state.store.list_api_keys(org_id).await?;
    Ok(Json(keys.into_iter().map(ApiKeyView::from).collect()))
}

pub async fn revoke_api_key<C: Connection>(
    State(state): State<AppState<C>>,
    Path((org_id, api_key_id)): Path<(EntityId, EntityId)>,
) -> Result<StatusCode, ApiError> {
    state.store.revoke_api_key(org_id, api_key_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Repairs
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub completed: usize,
}

pub async fn reconcile<C: Connection>(
    State(state): State<AppState<C>>,
    Path(org_id): Path<EntityId>,
) -> Result<Json<ReconcileResponse>, ApiError> {
    let completed = state.store.reconcile(org_id).await?;
    Ok(Json(ReconcileResponse { completed }))
}
