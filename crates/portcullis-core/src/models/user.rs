//! User domain model.

use serde::{Deserialize, Serialize};

use crate::id::EntityId;
use crate::models::attribute::AttributeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: EntityId,
    /// Login identifier, unique within the tenant.
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Open-ended attributes consumed by policy evaluation.
    #[serde(default)]
    pub user_properties: AttributeMap,
    #[serde(default)]
    pub roles: Vec<EntityId>,
    #[serde(default)]
    pub groups: Vec<EntityId>,
    #[serde(default)]
    pub policies: Vec<EntityId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub user_properties: AttributeMap,
    #[serde(default)]
    pub roles: Vec<EntityId>,
    #[serde(default)]
    pub groups: Vec<EntityId>,
    #[serde(default)]
    pub policies: Vec<EntityId>,
}

/// Whole-field replacement; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub user_properties: Option<AttributeMap>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatchUser {
    #[serde(default)]
    pub added_roles: Vec<EntityId>,
    #[serde(default)]
    pub removed_roles: Vec<EntityId>,
    #[serde(default)]
    pub added_groups: Vec<EntityId>,
    #[serde(default)]
    pub removed_groups: Vec<EntityId>,
    #[serde(default)]
    pub added_policies: Vec<EntityId>,
    #[serde(default)]
    pub removed_policies: Vec<EntityId>,
}
