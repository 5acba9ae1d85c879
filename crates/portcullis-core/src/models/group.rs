//! Group domain model.

use serde::{Deserialize, Serialize};

use crate::id::EntityId;

/// A named set of users. `users` mirrors `user.groups` in both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: EntityId,
    pub identifier: String,
    pub display_name: String,
    #[serde(default)]
    pub users: Vec<EntityId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateGroup {
    pub identifier: String,
    pub display_name: String,
    #[serde(default)]
    pub users: Vec<EntityId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateGroup {
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatchGroup {
    #[serde(default)]
    pub added_users: Vec<EntityId>,
    #[serde(default)]
    pub removed_users: Vec<EntityId>,
}
