//! Relationship graph entry points. Each request is gated by the tenant
//! API key and its object must name a relationship-kind resource.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use portcullis_authz::CheckResponse;
use portcullis_core::relationship::{RelationshipFilter, RelationshipTuple};
use serde::Serialize;
use surrealdb::Connection;

use crate::api::api_key;
use crate::api::error::{ApiError, json_body};
use crate::app::AppState;

#[derive(Debug, Serialize)]
pub struct RelationshipsResponse {
    pub relationships: Vec<RelationshipTuple>,
}

pub async fn check_relationship<C: Connection>(
    State(state): State<AppState<C>>,
    Path(org): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<RelationshipTuple>, JsonRejection>,
) -> Result<Json<CheckResponse>, ApiError> {
    let tuple = json_body(payload)?;
    let response = state
        .engine
        .check_relationship(&org, &tuple, api_key(&headers), false)
        .await?;
    Ok(Json(response))
}

pub async fn write_relationship<C: Connection>(
    State(state): State<AppState<C>>,
    Path(org): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<RelationshipTuple>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let tuple = json_body(payload)?;
    state
        .engine
        .write_relationship(&org, &tuple, api_key(&headers), false)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn read_relationships<C: Connection>(
    State(state): State<AppState<C>>,
    Path(org): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<RelationshipFilter>, JsonRejection>,
) -> Result<Json<RelationshipsResponse>, ApiError> {
    let filter = json_body(payload)?;
    let relationships = state
        .engine
        .read_relationships(&org, &filter, api_key(&headers), false)
        .await?;
    Ok(Json(RelationshipsResponse { relationships }))
}
