//! Authorization configuration.

use serde::Deserialize;

/// Configuration for policy evaluation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthzConfig {
    /// Boolean Rego query evaluated against every active policy version
    /// (default: `data.portcullis.allow`).
    pub policy_query: String,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            policy_query: "data.portcullis.allow".into(),
        }
    }
}

/// Connection settings for the external relationship graph.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelationshipConfig {
    /// Base URL, e.g. `http://127.0.0.1:8081`.
    pub base_url: String,
    /// Per-request timeout in seconds (default: 5).
    pub timeout_secs: u64,
}

impl Default for RelationshipConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8081".into(),
            timeout_secs: 5,
        }
    }
}
