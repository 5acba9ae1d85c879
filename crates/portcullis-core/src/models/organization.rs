//! Organization (tenant) aggregate.
//!
//! An organization is the unit of tenancy and the unit of storage: one
//! document per tenant holding every user, role, group, resource,
//! policy and API key by value. Mutations go through
//! [`Organization::apply`](crate::mutation) so the aggregate is only ever
//! changed by invariant-preserving, idempotent sub-operations.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::EntityId;
use crate::models::api_key::ApiKey;
use crate::models::group::Group;
use crate::models::policy::Policy;
use crate::models::resource::Resource;
use crate::models::role::Role;
use crate::models::user::User;

/// The tenant aggregate root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: EntityId,
    /// URL-safe unique tenant key (e.g. `org1`).
    pub identifier: String,
    pub display_name: String,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub policies: Vec<Policy>,
    #[serde(default)]
    pub api_keys: Vec<ApiKey>,
    /// Incremented by every persisted write; used for compare-and-swap.
    #[serde(default)]
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to provision a new organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrganization {
    pub identifier: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateOrganization {
    pub display_name: Option<String>,
}

/// Organization header without the embedded collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationSummary {
    pub id: EntityId,
    pub identifier: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The kinds of entity embedded in an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Role,
    Group,
    Resource,
    Policy,
    ApiKey,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Role => "role",
            EntityKind::Group => "group",
            EntityKind::Resource => "resource",
            EntityKind::Policy => "policy",
            EntityKind::ApiKey => "api_key",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Organization {
    /// A freshly provisioned, empty aggregate.
    pub fn new(input: CreateOrganization) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(),
            identifier: input.identifier,
            display_name: input.display_name,
            users: Vec::new(),
            roles: Vec::new(),
            groups: Vec::new(),
            resources: Vec::new(),
            policies: Vec::new(),
            api_keys: Vec::new(),
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn summary(&self) -> OrganizationSummary {
        OrganizationSummary {
            id: self.id,
            identifier: self.identifier.clone(),
            display_name: self.display_name.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn user(&self, id: EntityId) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn user_by_username(&self, username: &str) -> Option<&User> {
        self.users.iter().find(|u| u.username == username)
    }

    pub fn role(&self, id: EntityId) -> Option<&Role> {
        self.roles.iter().find(|r| r.id == id)
    }

    pub fn group(&self, id: EntityId) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn resource(&self, id: EntityId) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == id)
    }

    pub fn resource_by_identifier(&self, identifier: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.identifier == identifier)
    }

    pub fn policy(&self, id: EntityId) -> Option<&Policy> {
        self.policies.iter().find(|p| p.id == id)
    }

    pub fn api_key(&self, id: EntityId) -> Option<&ApiKey> {
        self.api_keys.iter().find(|k| k.id == id)
    }

    pub(crate) fn user_mut(&mut self, id: EntityId) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == id)
    }

    pub(crate) fn role_mut(&mut self, id: EntityId) -> Option<&mut Role> {
        self.roles.iter_mut().find(|r| r.id == id)
    }

    pub(crate) fn group_mut(&mut self, id: EntityId) -> Option<&mut Group> {
        self.groups.iter_mut().find(|g| g.id == id)
    }

    pub(crate) fn resource_mut(&mut self, id: EntityId) -> Option<&mut Resource> {
        self.resources.iter_mut().find(|r| r.id == id)
    }

    pub(crate) fn policy_mut(&mut self, id: EntityId) -> Option<&mut Policy> {
        self.policies.iter_mut().find(|p| p.id == id)
    }

    pub fn exists_by_id(&self, kind: EntityKind, id: EntityId) -> bool {
        match kind {
            EntityKind::User => self.user(id).is_some(),
            EntityKind::Role => self.role(id).is_some(),
            EntityKind::Group => self.group(id).is_some(),
            EntityKind::Resource => self.resource(id).is_some(),
            EntityKind::Policy => self.policy(id).is_some(),
            EntityKind::ApiKey => self.api_key(id).is_some(),
        }
    }

    /// Look up by the kind's unique identifier: username for users, name
    /// for API keys, `identifier` for everything else.
    pub fn exists_by_identifier(&self, kind: EntityKind, identifier: &str) -> bool {
        match kind {
            EntityKind::User => self.user_by_username(identifier).is_some(),
            EntityKind::Role => self.roles.iter().any(|r| r.identifier == identifier),
            EntityKind::Group => self.groups.iter().any(|g| g.identifier == identifier),
            EntityKind::Resource => self.resource_by_identifier(identifier).is_some(),
            EntityKind::Policy => self.policies.iter().any(|p| p.identifier == identifier),
            EntityKind::ApiKey => self.api_keys.iter().any(|k| k.name == identifier),
        }
    }

    pub fn action_exists(&self, resource_identifier: &str, action_identifier: &str) -> bool {
        self.resource_by_identifier(resource_identifier)
            .is_some_and(|r| r.action(action_identifier).is_some())
    }
}
