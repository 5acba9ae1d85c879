//! Attribute policy domain model.
//!
//! A policy holds one or more versions of opaque policy text. At most
//! one version is active at a time and only the active one is ever
//! evaluated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyVersion {
    /// 1-based, assigned in creation order.
    pub revision: u32,
    pub content: String,
    pub status: VersionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: EntityId,
    pub identifier: String,
    pub display_name: String,
    #[serde(default)]
    pub versions: Vec<PolicyVersion>,
}

impl Policy {
    pub fn active_version(&self) -> Option<&PolicyVersion> {
        self.versions
            .iter()
            .find(|v| v.status == VersionStatus::Active)
    }

    pub fn next_revision(&self) -> u32 {
        self.versions.iter().map(|v| v.revision).max().unwrap_or(0) + 1
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePolicy {
    pub identifier: String,
    pub display_name: String,
    /// Becomes revision 1, active, when present.
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPolicyVersion {
    pub content: String,
    /// Make the new version the single active one.
    #[serde(default)]
    pub activate: bool,
}
