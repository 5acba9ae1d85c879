//! HTTP handlers grouped by surface, plus the extractors they share.

pub mod admin;
pub mod check;
pub mod error;
pub mod groups;
pub mod policies;
pub mod relationships;
pub mod resources;
pub mod roles;
pub mod users;

use axum::http::HeaderMap;
use portcullis_core::repository::Pagination;
use serde::Deserialize;

/// Header carrying the tenant API key.
pub const API_KEY_HEADER: &str = "api_key";

/// The tenant API key, or empty when absent or not valid UTF-8. An empty
/// credential never matches a stored key.
pub(crate) fn api_key(headers: &HeaderMap) -> &str {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// `?offset=&limit=` on list routes.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl From<PageQuery> for Pagination {
    fn from(query: PageQuery) -> Self {
        let defaults = Pagination::default();
        Pagination {
            offset: query.offset.unwrap_or(defaults.offset),
            limit: query.limit.unwrap_or(defaults.limit),
        }
    }
}
