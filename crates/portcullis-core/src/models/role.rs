//! Role domain model.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::EntityId;

/// A (resource identifier, action identifier) pair granted by a role.
///
/// Matching is exact string equality on both halves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Permission {
    pub resource: String,
    pub action: String,
}

impl Permission {
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.action)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: EntityId,
    pub identifier: String,
    pub display_name: String,
    /// Back-links; mirrors `user.roles`.
    #[serde(default)]
    pub users: Vec<EntityId>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub policies: Vec<EntityId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateRole {
    pub identifier: String,
    pub display_name: String,
    #[serde(default)]
    pub users: Vec<EntityId>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub policies: Vec<EntityId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRole {
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatchRole {
    #[serde(default)]
    pub added_users: Vec<EntityId>,
    #[serde(default)]
    pub removed_users: Vec<EntityId>,
    #[serde(default)]
    pub added_permissions: Vec<Permission>,
    #[serde(default)]
    pub removed_permissions: Vec<Permission>,
    #[serde(default)]
    pub added_policies: Vec<EntityId>,
    #[serde(default)]
    pub removed_policies: Vec<EntityId>,
}
