//! Resource and action domain models.

use serde::{Deserialize, Serialize};

use crate::id::EntityId;

/// Whether a resource is authorized through roles or through the
/// external relationship graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    #[default]
    Plain,
    Relationship,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: EntityId,
    /// Unique within the owning resource.
    pub identifier: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: EntityId,
    pub identifier: String,
    pub display_name: String,
    #[serde(default)]
    pub kind: ResourceKind,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Resource {
    pub fn action(&self, identifier: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.identifier == identifier)
    }
}

/// An action as submitted by a caller, before an id is assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAction {
    pub identifier: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateResource {
    pub identifier: String,
    pub display_name: String,
    #[serde(default)]
    pub kind: ResourceKind,
    #[serde(default)]
    pub actions: Vec<NewAction>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateResource {
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatchResource {
    #[serde(default)]
    pub added_actions: Vec<NewAction>,
    /// Action identifiers to remove.
    #[serde(default)]
    pub removed_actions: Vec<String>,
}
