use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use portcullis_authz::{CheckRequest, CheckResponse};
use surrealdb::Connection;

use crate::api::api_key;
use crate::api::error::{ApiError, json_body};
use crate::app::AppState;

/// `POST /api/v1/{org}/permission/check`. Granted and denied are both 200.
pub async fn check_permission<C: Connection>(
    State(state): State<AppState<C>>,
    Path(org): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<CheckRequest>, JsonRejection>,
) -> Result<Json<CheckResponse>, ApiError> {
    let request = json_body(payload)?;
    let response = state
        .engine
        .check(&org, &request, api_key(&headers), false)
        .await?;
    Ok(Json(response))
}
