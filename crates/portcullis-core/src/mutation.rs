//! Single-document sub-operations on the organization aggregate.
//!
//! Every multi-entity change (linking a user to a role, deleting a user
//! and its back-references, ...) is expressed as an ordered list of
//! [`Mutation`]s, each applied as one atomic write against the tenant
//! document. Every variant is idempotent: applying it twice leaves the
//! aggregate as applying it once, so an interrupted sequence can simply
//! be replayed from the first unapplied step.
//!
//! `apply` enforces the uniqueness invariants that can be checked inside
//! one document; existence of *referenced* entities is validated by the
//! caller against a snapshot before the first write.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PortcullisError, PortcullisResult};
use crate::id::EntityId;
use crate::models::api_key::ApiKey;
use crate::models::attribute::AttributeMap;
use crate::models::group::Group;
use crate::models::organization::Organization;
use crate::models::policy::{Policy, PolicyVersion, VersionStatus};
use crate::models::resource::{Action, Resource};
use crate::models::role::{Permission, Role};
use crate::models::user::User;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    UpdateOrganization {
        display_name: String,
    },

    InsertUser {
        user: User,
    },
    UpdateUser {
        user_id: EntityId,
        first_name: Option<String>,
        last_name: Option<String>,
        user_properties: Option<AttributeMap>,
    },
    RemoveUser {
        user_id: EntityId,
    },

    /// Forward half of user↔role: `user.roles += role`.
    LinkUserRole {
        user_id: EntityId,
        role_id: EntityId,
    },
    /// Back half of user↔role: `role.users += user`.
    LinkRoleUser {
        role_id: EntityId,
        user_id: EntityId,
    },
    UnlinkUserRole {
        user_id: EntityId,
        role_id: EntityId,
    },
    UnlinkRoleUser {
        role_id: EntityId,
        user_id: EntityId,
    },

    LinkUserGroup {
        user_id: EntityId,
        group_id: EntityId,
    },
    LinkGroupUser {
        group_id: EntityId,
        user_id: EntityId,
    },
    UnlinkUserGroup {
        user_id: EntityId,
        group_id: EntityId,
    },
    UnlinkGroupUser {
        group_id: EntityId,
        user_id: EntityId,
    },

    LinkUserPolicy {
        user_id: EntityId,
        policy_id: EntityId,
    },
    UnlinkUserPolicy {
        user_id: EntityId,
        policy_id: EntityId,
    },
    LinkRolePolicy {
        role_id: EntityId,
        policy_id: EntityId,
    },
    UnlinkRolePolicy {
        role_id: EntityId,
        policy_id: EntityId,
    },

    InsertRole {
        role: Role,
    },
    UpdateRole {
        role_id: EntityId,
        display_name: String,
    },
    RemoveRole {
        role_id: EntityId,
    },
    GrantPermissions {
        role_id: EntityId,
        permissions: Vec<Permission>,
    },
    RevokePermissions {
        role_id: EntityId,
        permissions: Vec<Permission>,
    },

    InsertGroup {
        group: Group,
    },
    UpdateGroup {
        group_id: EntityId,
        display_name: String,
    },
    RemoveGroup {
        group_id: EntityId,
    },

    InsertResource {
        resource: Resource,
    },
    UpdateResource {
        resource_id: EntityId,
        display_name: String,
    },
    AddActions {
        resource_id: EntityId,
        actions: Vec<Action>,
    },
    RemoveActions {
        resource_id: EntityId,
        identifiers: Vec<String>,
    },
    RemoveResource {
        resource_id: EntityId,
    },

    InsertPolicy {
        policy: Policy,
    },
    AddPolicyVersion {
        policy_id: EntityId,
        version: PolicyVersion,
        activate: bool,
    },
    ActivatePolicyVersion {
        policy_id: EntityId,
        revision: u32,
    },
    RemovePolicy {
        policy_id: EntityId,
    },

    InsertApiKey {
        api_key: ApiKey,
    },
    RemoveApiKey {
        api_key_id: EntityId,
    },
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::UpdateOrganization { .. } => write!(f, "update_organization"),
            Mutation::InsertUser { user } => write!(f, "insert_user({})", user.id),
            Mutation::UpdateUser { user_id, .. } => write!(f, "update_user({user_id})"),
            Mutation::RemoveUser { user_id } => write!(f, "remove_user({user_id})"),
            Mutation::LinkUserRole { user_id, role_id } => {
                write!(f, "link_user_role({user_id}, {role_id})")
            }
            Mutation::LinkRoleUser { role_id, user_id } => {
                write!(f, "link_role_user({role_id}, {user_id})")
            }
            Mutation::UnlinkUserRole { user_id, role_id } => {
                write!(f, "unlink_user_role({user_id}, {role_id})")
            }
            Mutation::UnlinkRoleUser { role_id, user_id } => {
                write!(f, "unlink_role_user({role_id}, {user_id})")
            }
            Mutation::LinkUserGroup { user_id, group_id } => {
                write!(f, "link_user_group({user_id}, {group_id})")
            }
            Mutation::LinkGroupUser { group_id, user_id } => {
                write!(f, "link_group_user({group_id}, {user_id})")
            }
            Mutation::UnlinkUserGroup { user_id, group_id } => {
                write!(f, "unlink_user_group({user_id}, {group_id})")
            }
            Mutation::UnlinkGroupUser { group_id, user_id } => {
                write!(f, "unlink_group_user({group_id}, {user_id})")
            }
            Mutation::LinkUserPolicy { user_id, policy_id } => {
                write!(f, "link_user_policy({user_id}, {policy_id})")
            }
            Mutation::UnlinkUserPolicy { user_id, policy_id } => {
                write!(f, "unlink_user_policy({user_id}, {policy_id})")
            }
            Mutation::LinkRolePolicy { role_id, policy_id } => {
                write!(f, "link_role_policy({role_id}, {policy_id})")
            }
            Mutation::UnlinkRolePolicy { role_id, policy_id } => {
                write!(f, "unlink_role_policy({role_id}, {policy_id})")
            }
            Mutation::InsertRole { role } => write!(f, "insert_role({})", role.id),
            Mutation::UpdateRole { role_id, .. } => write!(f, "update_role({role_id})"),
            Mutation::RemoveRole { role_id } => write!(f, "remove_role({role_id})"),
            Mutation::GrantPermissions { role_id, .. } => {
                write!(f, "grant_permissions({role_id})")
            }
            Mutation::RevokePermissions { role_id, .. } => {
                write!(f, "revoke_permissions({role_id})")
            }
            Mutation::InsertGroup { group } => write!(f, "insert_group({})", group.id),
            Mutation::UpdateGroup { group_id, .. } => write!(f, "update_group({group_id})"),
            Mutation::RemoveGroup { group_id } => write!(f, "remove_group({group_id})"),
            Mutation::InsertResource { resource } => {
                write!(f, "insert_resource({})", resource.id)
            }
            Mutation::UpdateResource { resource_id, .. } => {
                write!(f, "update_resource({resource_id})")
            }
            Mutation::AddActions { resource_id, .. } => write!(f, "add_actions({resource_id})"),
            Mutation::RemoveActions { resource_id, .. } => {
                write!(f, "remove_actions({resource_id})")
            }
            Mutation::RemoveResource { resource_id } => {
                write!(f, "remove_resource({resource_id})")
            }
            Mutation::InsertPolicy { policy } => write!(f, "insert_policy({})", policy.id),
            Mutation::AddPolicyVersion {
                policy_id, version, ..
            } => write!(f, "add_policy_version({policy_id}, {})", version.revision),
            Mutation::ActivatePolicyVersion {
                policy_id,
                revision,
            } => write!(f, "activate_policy_version({policy_id}, {revision})"),
            Mutation::RemovePolicy { policy_id } => write!(f, "remove_policy({policy_id})"),
            Mutation::InsertApiKey { api_key } => write!(f, "insert_api_key({})", api_key.id),
            Mutation::RemoveApiKey { api_key_id } => write!(f, "remove_api_key({api_key_id})"),
        }
    }
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}

fn missing(entity: &str, id: EntityId) -> PortcullisError {
    PortcullisError::not_found(entity, id.to_string())
}

impl Organization {
    /// Apply one sub-operation in memory.
    ///
    /// Link operations fail with `NotFound` when the entity being written
    /// to is gone; unlink and remove operations treat a missing entity as
    /// already done.
    pub fn apply(&mut self, mutation: &Mutation) -> PortcullisResult<()> {
        match mutation {
            Mutation::UpdateOrganization { display_name } => {
                self.display_name.clone_from(display_name);
            }

            Mutation::InsertUser { user } => {
                if self.user(user.id).is_some() {
                    return Ok(());
                }
                if self.user_by_username(&user.username).is_some() {
                    return Err(PortcullisError::already_exists("user", &user.username));
                }
                self.users.push(user.clone());
            }
            Mutation::UpdateUser {
                user_id,
                first_name,
                last_name,
                user_properties,
            } => {
                let user = self.user_mut(*user_id).ok_or_else(|| missing("user", *user_id))?;
                if let Some(v) = first_name {
                    user.first_name.clone_from(v);
                }
                if let Some(v) = last_name {
                    user.last_name.clone_from(v);
                }
                if let Some(v) = user_properties {
                    user.user_properties.clone_from(v);
                }
            }
            Mutation::RemoveUser { user_id } => self.users.retain(|u| u.id != *user_id),

            Mutation::LinkUserRole { user_id, role_id } => {
                let user = self.user_mut(*user_id).ok_or_else(|| missing("user", *user_id))?;
                push_unique(&mut user.roles, *role_id);
            }
            Mutation::LinkRoleUser { role_id, user_id } => {
                let role = self.role_mut(*role_id).ok_or_else(|| missing("role", *role_id))?;
                push_unique(&mut role.users, *user_id);
            }
            Mutation::UnlinkUserRole { user_id, role_id } => {
                if let Some(user) = self.user_mut(*user_id) {
                    user.roles.retain(|r| r != role_id);
                }
            }
            Mutation::UnlinkRoleUser { role_id, user_id } => {
                if let Some(role) = self.role_mut(*role_id) {
                    role.users.retain(|u| u != user_id);
                }
            }

            Mutation::LinkUserGroup { user_id, group_id } => {
                let user = self.user_mut(*user_id).ok_or_else(|| missing("user", *user_id))?;
                push_unique(&mut user.groups, *group_id);
            }
            Mutation::LinkGroupUser { group_id, user_id } => {
                let group = self
                    .group_mut(*group_id)
                    .ok_or_else(|| missing("group", *group_id))?;
                push_unique(&mut group.users, *user_id);
            }
            Mutation::UnlinkUserGroup { user_id, group_id } => {
                if let Some(user) = self.user_mut(*user_id) {
                    user.groups.retain(|g| g != group_id);
                }
            }
            Mutation::UnlinkGroupUser { group_id, user_id } => {
                if let Some(group) = self.group_mut(*group_id) {
                    group.users.retain(|u| u != user_id);
                }
            }

            Mutation::LinkUserPolicy { user_id, policy_id } => {
                let user = self.user_mut(*user_id).ok_or_else(|| missing("user", *user_id))?;
                push_unique(&mut user.policies, *policy_id);
            }
            Mutation::UnlinkUserPolicy { user_id, policy_id } => {
                if let Some(user) = self.user_mut(*user_id) {
                    user.policies.retain(|p| p != policy_id);
                }
            }
            Mutation::LinkRolePolicy { role_id, policy_id } => {
                let role = self.role_mut(*role_id).ok_or_else(|| missing("role", *role_id))?;
                push_unique(&mut role.policies, *policy_id);
            }
            Mutation::UnlinkRolePolicy { role_id, policy_id } => {
                if let Some(role) = self.role_mut(*role_id) {
                    role.policies.retain(|p| p != policy_id);
                }
            }

            Mutation::InsertRole { role } => {
                if self.role(role.id).is_some() {
                    return Ok(());
                }
                if self.roles.iter().any(|r| r.identifier == role.identifier) {
                    return Err(PortcullisError::already_exists("role", &role.identifier));
                }
                self.roles.push(role.clone());
            }
            Mutation::UpdateRole {
                role_id,
                display_name,
            } => {
                let role = self.role_mut(*role_id).ok_or_else(|| missing("role", *role_id))?;
                role.display_name.clone_from(display_name);
            }
            Mutation::RemoveRole { role_id } => self.roles.retain(|r| r.id != *role_id),
            Mutation::GrantPermissions {
                role_id,
                permissions,
            } => {
                let role = self.role_mut(*role_id).ok_or_else(|| missing("role", *role_id))?;
                for permission in permissions {
                    push_unique(&mut role.permissions, permission.clone());
                }
            }
            Mutation::RevokePermissions {
                role_id,
                permissions,
            } => {
                if let Some(role) = self.role_mut(*role_id) {
                    role.permissions.retain(|p| !permissions.contains(p));
                }
            }

            Mutation::InsertGroup { group } => {
                if self.group(group.id).is_some() {
                    return Ok(());
                }
                if self.groups.iter().any(|g| g.identifier == group.identifier) {
                    return Err(PortcullisError::already_exists("group", &group.identifier));
                }
                self.groups.push(group.clone());
            }
            Mutation::UpdateGroup {
                group_id,
                display_name,
            } => {
                let group = self
                    .group_mut(*group_id)
                    .ok_or_else(|| missing("group", *group_id))?;
                group.display_name.clone_from(display_name);
            }
            Mutation::RemoveGroup { group_id } => self.groups.retain(|g| g.id != *group_id),

            Mutation::InsertResource { resource } => {
                if self.resource(resource.id).is_some() {
                    return Ok(());
                }
                if self.resource_by_identifier(&resource.identifier).is_some() {
                    return Err(PortcullisError::already_exists(
                        "resource",
                        &resource.identifier,
                    ));
                }
                self.resources.push(resource.clone());
            }
            Mutation::UpdateResource {
                resource_id,
                display_name,
            } => {
                let resource = self
                    .resource_mut(*resource_id)
                    .ok_or_else(|| missing("resource", *resource_id))?;
                resource.display_name.clone_from(display_name);
            }
            Mutation::AddActions {
                resource_id,
                actions,
            } => {
                let resource = self
                    .resource_mut(*resource_id)
                    .ok_or_else(|| missing("resource", *resource_id))?;
                for action in actions {
                    // Identifier uniqueness within the resource is the
                    // invariant; a replay finds the action already there.
                    if resource.action(&action.identifier).is_none() {
                        resource.actions.push(action.clone());
                    }
                }
            }
            Mutation::RemoveActions {
                resource_id,
                identifiers,
            } => {
                if let Some(resource) = self.resource_mut(*resource_id) {
                    resource
                        .actions
                        .retain(|a| !identifiers.contains(&a.identifier));
                }
            }
            Mutation::RemoveResource { resource_id } => {
                self.resources.retain(|r| r.id != *resource_id);
            }

            Mutation::InsertPolicy { policy } => {
                if self.policy(policy.id).is_some() {
                    return Ok(());
                }
                if self.policies.iter().any(|p| p.identifier == policy.identifier) {
                    return Err(PortcullisError::already_exists("policy", &policy.identifier));
                }
                self.policies.push(policy.clone());
            }
            Mutation::AddPolicyVersion {
                policy_id,
                version,
                activate,
            } => {
                let policy = self
                    .policy_mut(*policy_id)
                    .ok_or_else(|| missing("policy", *policy_id))?;
                if !policy.versions.iter().any(|v| v.revision == version.revision) {
                    let mut version = version.clone();
                    version.status = VersionStatus::Inactive;
                    policy.versions.push(version);
                }
                if *activate {
                    activate_revision(policy, version.revision);
                }
            }
            Mutation::ActivatePolicyVersion {
                policy_id,
                revision,
            } => {
                let policy = self
                    .policy_mut(*policy_id)
                    .ok_or_else(|| missing("policy", *policy_id))?;
                if !policy.versions.iter().any(|v| v.revision == *revision) {
                    return Err(PortcullisError::not_found(
                        "policy_version",
                        format!("{policy_id}@{revision}"),
                    ));
                }
                activate_revision(policy, *revision);
            }
            Mutation::RemovePolicy { policy_id } => self.policies.retain(|p| p.id != *policy_id),

            Mutation::InsertApiKey { api_key } => {
                if self.api_key(api_key.id).is_none() {
                    self.api_keys.push(api_key.clone());
                }
            }
            Mutation::RemoveApiKey { api_key_id } => {
                self.api_keys.retain(|k| k.id != *api_key_id);
            }
        }
        Ok(())
    }
}

/// Mark exactly one revision active.
fn activate_revision(policy: &mut Policy, revision: u32) {
    for v in &mut policy.versions {
        v.status = if v.revision == revision {
            VersionStatus::Active
        } else {
            VersionStatus::Inactive
        };
    }
}
