//! Tenant API key model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::EntityId;

/// A credential registered for a tenant. Only the SHA-256 hash of the
/// raw key is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: EntityId,
    pub name: String,
    /// Leading characters of the raw key, kept for display.
    pub prefix: String,
    /// Hex-encoded SHA-256 of the raw key.
    pub key_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateApiKey {
    pub name: String,
}
