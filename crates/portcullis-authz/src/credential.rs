//! Tenant API key issuance and verification.
//!
//! Raw keys are 32 random bytes, base64url-encoded without padding.
//! Only the hex SHA-256 of a key is persisted.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use portcullis_core::id::EntityId;
use portcullis_core::models::api_key::ApiKey;
use sha2::{Digest, Sha256};

/// Leading characters of the raw key kept for display.
pub const PREFIX_LEN: usize = 8;

/// A freshly issued key. `raw_key` is shown to the caller exactly once.
#[derive(Debug, Clone)]
pub struct IssuedApiKey {
    pub api_key: ApiKey,
    pub raw_key: String,
}

/// Generate a cryptographically random raw API key.
pub fn generate_api_key() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rand::Rng::random(&mut rng);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hash of a raw API key, hex-encoded.
pub fn hash_api_key(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Build the stored record for a new key.
pub fn issue(name: &str) -> IssuedApiKey {
    let raw_key = generate_api_key();
    let api_key = ApiKey {
        id: EntityId::new(),
        name: name.to_owned(),
        prefix: raw_key.chars().take(PREFIX_LEN).collect(),
        key_hash: hash_api_key(&raw_key),
        created_at: Utc::now(),
    };
    IssuedApiKey { api_key, raw_key }
}

/// Whether `presented` matches any of the tenant's keys. An empty
/// credential never matches.
pub fn verify(presented: &str, keys: &[ApiKey]) -> bool {
    if presented.is_empty() {
        return false;
    }
    let hash = hash_api_key(presented);
    keys.iter().any(|k| k.key_hash == hash)
}
