//! Tenant administration over the organization aggregate.
//!
//! Every operation validates against one loaded snapshot before the
//! first write, then hands an ordered list of [`Mutation`]s to the
//! [`RelationManager`]. Bidirectional links (user↔role, user↔group) are
//! always written forward first, then backward.

use std::collections::HashSet;
use std::hash::Hash;

use chrono::Utc;
use portcullis_core::error::{PortcullisError, PortcullisResult};
use portcullis_core::id::EntityId;
use portcullis_core::models::api_key::{ApiKey, CreateApiKey};
use portcullis_core::models::group::{CreateGroup, Group, PatchGroup, UpdateGroup};
use portcullis_core::models::organization::{
    CreateOrganization, EntityKind, Organization, OrganizationSummary, UpdateOrganization,
};
use portcullis_core::models::policy::{
    CreatePolicy, NewPolicyVersion, Policy, PolicyVersion, VersionStatus,
};
use portcullis_core::models::resource::{
    Action, CreateResource, NewAction, PatchResource, Resource, UpdateResource,
};
use portcullis_core::models::role::{CreateRole, PatchRole, Role, UpdateRole};
use portcullis_core::models::user::{CreateUser, PatchUser, UpdateUser, User};
use portcullis_core::mutation::Mutation;
use portcullis_core::repository::{OrganizationRepository, PaginatedResult, Pagination};
use tracing::{error, info, warn};

use crate::credential::{self, IssuedApiKey};

/// Applies an ordered sequence of sub-operations to one tenant.
///
/// A failure on the first step is returned as-is: nothing was written.
/// A failure on any later step leaves the aggregate half-linked, so the
/// unapplied remainder is queued as a pending repair, a
/// `data_consistency` incident is logged, and the call fails with
/// `Infrastructure`. [`TenantStore::reconcile`] finishes the job.
pub struct RelationManager<'a, R: OrganizationRepository> {
    repo: &'a R,
    org_id: EntityId,
}

impl<'a, R: OrganizationRepository> RelationManager<'a, R> {
    pub fn new(repo: &'a R, org_id: EntityId) -> Self {
        Self { repo, org_id }
    }

    pub async fn run(
        &self,
        operation: &'static str,
        steps: Vec<Mutation>,
    ) -> PortcullisResult<Organization> {
        let mut latest = None;
        for (index, step) in steps.iter().enumerate() {
            match self.repo.apply(self.org_id, step).await {
                Ok(org) => latest = Some(org),
                Err(err) if index == 0 => return Err(err),
                Err(err) => return Err(self.defer(operation, &steps[index..], err).await),
            }
        }
        match latest {
            Some(org) => Ok(org),
            None => self.repo.get_by_id(self.org_id).await,
        }
    }

    async fn defer(
        &self,
        operation: &'static str,
        remaining: &[Mutation],
        cause: PortcullisError,
    ) -> PortcullisError {
        let failed_step = remaining
            .first()
            .map(ToString::to_string)
            .unwrap_or_default();
        error!(
            incident = "data_consistency",
            organization_id = %self.org_id,
            operation,
            failed_step = %failed_step,
            remaining = remaining.len(),
            error = %cause,
            "Partial write, queueing remaining steps for reconciliation"
        );

        let reason = format!("{operation}: {cause}");
        if let Err(queue_err) = self
            .repo
            .record_repair(self.org_id, remaining, &reason)
            .await
        {
            error!(
                incident = "data_consistency",
                organization_id = %self.org_id,
                operation,
                error = %queue_err,
                "Could not queue reconciliation"
            );
        }

        PortcullisError::Infrastructure(format!(
            "{operation} partially applied, remaining steps queued for reconciliation: {cause}"
        ))
    }
}

fn require_text(field: &str, value: &str) -> PortcullisResult<()> {
    if value.trim().is_empty() {
        return Err(PortcullisError::invalid_input(format!(
            "{field} must not be empty"
        )));
    }
    Ok(())
}

/// Tenant keys end up in URL paths.
fn validate_org_identifier(identifier: &str) -> PortcullisResult<()> {
    require_text("identifier", identifier)?;
    if !identifier
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(PortcullisError::invalid_input(format!(
            "identifier '{identifier}' may only contain ASCII letters, digits, '-' and '_'"
        )));
    }
    Ok(())
}

fn dedup<T: Eq + Hash + Clone>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|i| seen.insert(i.clone())).collect()
}

fn ensure_exist(
    entity: &str,
    ids: &[EntityId],
    exists: impl Fn(EntityId) -> bool,
) -> PortcullisResult<()> {
    match ids.iter().find(|id| !exists(**id)) {
        Some(id) => Err(PortcullisError::not_found(entity, id.to_string())),
        None => Ok(()),
    }
}

/// Added items must not already be related and must not repeat.
fn ensure_new<T: Eq + Hash + ToString>(
    relation: &str,
    current: &[T],
    added: &[T],
) -> PortcullisResult<()> {
    let mut seen = HashSet::new();
    for item in added {
        if current.contains(item) || !seen.insert(item) {
            return Err(PortcullisError::already_exists(relation, item.to_string()));
        }
    }
    Ok(())
}

fn ensure_present<T: PartialEq + ToString>(
    relation: &str,
    current: &[T],
    removed: &[T],
) -> PortcullisResult<()> {
    match removed.iter().find(|item| !current.contains(item)) {
        Some(item) => Err(PortcullisError::not_found(relation, item.to_string())),
        None => Ok(()),
    }
}

fn found<T: Clone>(item: Option<&T>, entity: &str, id: EntityId) -> PortcullisResult<T> {
    item.cloned()
        .ok_or_else(|| PortcullisError::not_found(entity, id.to_string()))
}

fn new_actions(actions: Vec<NewAction>, existing: &Resource) -> PortcullisResult<Vec<Action>> {
    let mut seen = HashSet::new();
    actions
        .into_iter()
        .map(|a| {
            require_text("action identifier", &a.identifier)?;
            if existing.action(&a.identifier).is_some() || !seen.insert(a.identifier.clone()) {
                return Err(PortcullisError::already_exists("action", a.identifier));
            }
            let display_name = if a.display_name.is_empty() {
                a.identifier.clone()
            } else {
                a.display_name
            };
            Ok(Action {
                id: EntityId::new(),
                identifier: a.identifier,
                display_name,
            })
        })
        .collect()
}

/// Administrative operations on tenants.
///
/// Generic over the repository so that the service layer has no
/// dependency on the database crate.
#[derive(Clone)]
pub struct TenantStore<R: OrganizationRepository> {
    repo: R,
}

impl<R: OrganizationRepository> TenantStore<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    fn relations(&self, org_id: EntityId) -> RelationManager<'_, R> {
        RelationManager::new(&self.repo, org_id)
    }

    async fn load(&self, org_id: EntityId) -> PortcullisResult<Organization> {
        self.repo.get_by_id(org_id).await
    }

    // -------------------------------------------------------------------
    // Organizations
    // -------------------------------------------------------------------

    pub async fn create_organization(
        &self,
        input: CreateOrganization,
    ) -> PortcullisResult<Organization> {
        validate_org_identifier(&input.identifier)?;
        require_text("display_name", &input.display_name)?;

        let org = self.repo.create(input).await?;
        info!(
            organization_id = %org.id,
            identifier = %org.identifier,
            "Provisioned organization"
        );
        Ok(org)
    }

    pub async fn get_organization(&self, org_id: EntityId) -> PortcullisResult<Organization> {
        self.load(org_id).await
    }

    pub async fn get_organization_by_identifier(
        &self,
        identifier: &str,
    ) -> PortcullisResult<Organization> {
        self.repo.get_by_identifier(identifier).await
    }

    pub async fn update_organization(
        &self,
        org_id: EntityId,
        input: UpdateOrganization,
    ) -> PortcullisResult<Organization> {
        match input.display_name {
            Some(display_name) => {
                require_text("display_name", &display_name)?;
                self.repo
                    .apply(org_id, &Mutation::UpdateOrganization { display_name })
                    .await
            }
            None => self.load(org_id).await,
        }
    }

    pub async fn delete_organization(&self, org_id: EntityId) -> PortcullisResult<()> {
        let org = self.load(org_id).await?;
        self.repo.delete(org_id).await?;
        info!(
            organization_id = %org_id,
            identifier = %org.identifier,
            "Deleted organization"
        );
        Ok(())
    }

    pub async fn list_organizations(
        &self,
        pagination: Pagination,
    ) -> PortcullisResult<PaginatedResult<OrganizationSummary>> {
        self.repo.list(pagination).await
    }

    // -------------------------------------------------------------------
    // Existence checks
    // -------------------------------------------------------------------

    pub async fn exists_by_id(
        &self,
        org_id: EntityId,
        kind: EntityKind,
        id: EntityId,
    ) -> PortcullisResult<bool> {
        self.repo.exists_by_id(org_id, kind, id).await
    }

    pub async fn exists_by_identifier(
        &self,
        org_id: EntityId,
        kind: EntityKind,
        identifier: &str,
    ) -> PortcullisResult<bool> {
        self.repo
            .exists_by_identifier(org_id, kind, identifier)
            .await
    }

    pub async fn action_exists(
        &self,
        org_id: EntityId,
        resource_identifier: &str,
        action_identifier: &str,
    ) -> PortcullisResult<bool> {
        Ok(self
            .load(org_id)
            .await?
            .action_exists(resource_identifier, action_identifier))
    }

    // -------------------------------------------------------------------
    // Users
    // -------------------------------------------------------------------

    pub async fn create_user(&self, org_id: EntityId, input: CreateUser) -> PortcullisResult<User> {
        require_text("username", &input.username)?;
        let org = self.load(org_id).await?;
        if org.user_by_username(&input.username).is_some() {
            return Err(PortcullisError::already_exists("user", input.username));
        }

        let roles = dedup(input.roles);
        let groups = dedup(input.groups);
        let policies = dedup(input.policies);
        ensure_exist("role", &roles, |id| org.role(id).is_some())?;
        ensure_exist("group", &groups, |id| org.group(id).is_some())?;
        ensure_exist("policy", &policies, |id| org.policy(id).is_some())?;

        let user = User {
            id: EntityId::new(),
            username: input.username,
            first_name: input.first_name,
            last_name: input.last_name,
            user_properties: input.user_properties,
            roles: roles.clone(),
            groups: groups.clone(),
            policies,
        };
        let user_id = user.id;

        let mut steps = vec![Mutation::InsertUser { user }];
        steps.extend(
            roles
                .into_iter()
                .map(|role_id| Mutation::LinkRoleUser { role_id, user_id }),
        );
        steps.extend(
            groups
                .into_iter()
                .map(|group_id| Mutation::LinkGroupUser { group_id, user_id }),
        );

        let org = self.relations(org_id).run("create_user", steps).await?;
        found(org.user(user_id), "user", user_id)
    }

    pub async fn get_user(&self, org_id: EntityId, user_id: EntityId) -> PortcullisResult<User> {
        let org = self.load(org_id).await?;
        found(org.user(user_id), "user", user_id)
    }

    pub async fn get_user_by_username(
        &self,
        org_id: EntityId,
        username: &str,
    ) -> PortcullisResult<User> {
        let org = self.load(org_id).await?;
        org.user_by_username(username)
            .cloned()
            .ok_or_else(|| PortcullisError::not_found("user", username))
    }

    pub async fn list_users(
        &self,
        org_id: EntityId,
        pagination: Pagination,
    ) -> PortcullisResult<PaginatedResult<User>> {
        Ok(pagination.apply(&self.load(org_id).await?.users))
    }

    pub async fn update_user(
        &self,
        org_id: EntityId,
        user_id: EntityId,
        input: UpdateUser,
    ) -> PortcullisResult<User> {
        let org = self
            .repo
            .apply(
                org_id,
                &Mutation::UpdateUser {
                    user_id,
                    first_name: input.first_name,
                    last_name: input.last_name,
                    user_properties: input.user_properties,
                },
            )
            .await?;
        found(org.user(user_id), "user", user_id)
    }

    pub async fn patch_user(
        &self,
        org_id: EntityId,
        user_id: EntityId,
        patch: PatchUser,
    ) -> PortcullisResult<User> {
        let org = self.load(org_id).await?;
        let user = found(org.user(user_id), "user", user_id)?;

        ensure_exist("role", &patch.added_roles, |id| org.role(id).is_some())?;
        ensure_new("role membership", &user.roles, &patch.added_roles)?;
        ensure_exist("group", &patch.added_groups, |id| org.group(id).is_some())?;
        ensure_new("group membership", &user.groups, &patch.added_groups)?;
        ensure_exist("policy", &patch.added_policies, |id| {
            org.policy(id).is_some()
        })?;
        ensure_new("policy attachment", &user.policies, &patch.added_policies)?;
        ensure_present("role membership", &user.roles, &patch.removed_roles)?;
        ensure_present("group membership", &user.groups, &patch.removed_groups)?;
        ensure_present("policy attachment", &user.policies, &patch.removed_policies)?;

        let mut steps = Vec::new();
        for &role_id in &patch.added_roles {
            steps.push(Mutation::LinkUserRole { user_id, role_id });
            steps.push(Mutation::LinkRoleUser { role_id, user_id });
        }
        for &role_id in &patch.removed_roles {
            steps.push(Mutation::UnlinkUserRole { user_id, role_id });
            steps.push(Mutation::UnlinkRoleUser { role_id, user_id });
        }
        for &group_id in &patch.added_groups {
            steps.push(Mutation::LinkUserGroup { user_id, group_id });
            steps.push(Mutation::LinkGroupUser { group_id, user_id });
        }
        for &group_id in &patch.removed_groups {
            steps.push(Mutation::UnlinkUserGroup { user_id, group_id });
            steps.push(Mutation::UnlinkGroupUser { group_id, user_id });
        }
        for &policy_id in &patch.added_policies {
            steps.push(Mutation::LinkUserPolicy { user_id, policy_id });
        }
        for &policy_id in &patch.removed_policies {
            steps.push(Mutation::UnlinkUserPolicy { user_id, policy_id });
        }
        if steps.is_empty() {
            return Ok(user);
        }

        let org = self.relations(org_id).run("patch_user", steps).await?;
        found(org.user(user_id), "user", user_id)
    }

    /// Pull the user out of every role and group, then remove it.
    pub async fn delete_user(&self, org_id: EntityId, user_id: EntityId) -> PortcullisResult<()> {
        let org = self.load(org_id).await?;
        let user = found(org.user(user_id), "user", user_id)?;

        let roles = dedup(
            user.roles
                .iter()
                .copied()
                .chain(
                    org.roles
                        .iter()
                        .filter(|r| r.users.contains(&user_id))
                        .map(|r| r.id),
                )
                .collect(),
        );
        let groups = dedup(
            user.groups
                .iter()
                .copied()
                .chain(
                    org.groups
                        .iter()
                        .filter(|g| g.users.contains(&user_id))
                        .map(|g| g.id),
                )
                .collect(),
        );

        let mut steps: Vec<Mutation> = roles
            .into_iter()
            .map(|role_id| Mutation::UnlinkRoleUser { role_id, user_id })
            .collect();
        steps.extend(
            groups
                .into_iter()
                .map(|group_id| Mutation::UnlinkGroupUser { group_id, user_id }),
        );
        steps.push(Mutation::RemoveUser { user_id });

        self.relations(org_id).run("delete_user", steps).await?;
        Ok(())
    }

    // -------------------------------------------------------------------
    // Roles
    // -------------------------------------------------------------------

    pub async fn create_role(&self, org_id: EntityId, input: CreateRole) -> PortcullisResult<Role> {
        require_text("identifier", &input.identifier)?;
        let org = self.load(org_id).await?;
        if org.exists_by_identifier(EntityKind::Role, &input.identifier) {
            return Err(PortcullisError::already_exists("role", input.identifier));
        }

        let users = dedup(input.users);
        let permissions = dedup(input.permissions);
        let policies = dedup(input.policies);
        ensure_exist("user", &users, |id| org.user(id).is_some())?;
        if let Some(p) = permissions
            .iter()
            .find(|p| !org.action_exists(&p.resource, &p.action))
        {
            return Err(PortcullisError::not_found("action", p.to_string()));
        }
        ensure_exist("policy", &policies, |id| org.policy(id).is_some())?;

        let role = Role {
            id: EntityId::new(),
            identifier: input.identifier,
            display_name: input.display_name,
            users: users.clone(),
            permissions,
            policies,
        };
        let role_id = role.id;

        let mut steps = vec![Mutation::InsertRole { role }];
        steps.extend(
            users
                .into_iter()
                .map(|user_id| Mutation::LinkUserRole { user_id, role_id }),
        );

        let org = self.relations(org_id).run("create_role", steps).await?;
        found(org.role(role_id), "role", role_id)
    }

    pub async fn get_role(&self, org_id: EntityId, role_id: EntityId) -> PortcullisResult<Role> {
        let org = self.load(org_id).await?;
        found(org.role(role_id), "role", role_id)
    }

    pub async fn list_roles(
        &self,
        org_id: EntityId,
        pagination: Pagination,
    ) -> PortcullisResult<PaginatedResult<Role>> {
        Ok(pagination.apply(&self.load(org_id).await?.roles))
    }

    pub async fn update_role(
        &self,
        org_id: EntityId,
        role_id: EntityId,
        input: UpdateRole,
    ) -> PortcullisResult<Role> {
        let Some(display_name) = input.display_name else {
            return self.get_role(org_id, role_id).await;
        };
        let org = self
            .repo
            .apply(
                org_id,
                &Mutation::UpdateRole {
                    role_id,
                    display_name,
                },
            )
            .await?;
        found(org.role(role_id), "role", role_id)
    }

    pub async fn patch_role(
        &self,
        org_id: EntityId,
        role_id: EntityId,
        patch: PatchRole,
    ) -> PortcullisResult<Role> {
        let org = self.load(org_id).await?;
        let role = found(org.role(role_id), "role", role_id)?;

        ensure_exist("user", &patch.added_users, |id| org.user(id).is_some())?;
        ensure_new("role membership", &role.users, &patch.added_users)?;
        if let Some(p) = patch
            .added_permissions
            .iter()
            .find(|p| !org.action_exists(&p.resource, &p.action))
        {
            return Err(PortcullisError::not_found("action", p.to_string()));
        }
        ensure_new("permission", &role.permissions, &patch.added_permissions)?;
        ensure_exist("policy", &patch.added_policies, |id| {
            org.policy(id).is_some()
        })?;
        ensure_new("policy attachment", &role.policies, &patch.added_policies)?;
        ensure_present("role membership", &role.users, &patch.removed_users)?;
        ensure_present("permission", &role.permissions, &patch.removed_permissions)?;
        ensure_present("policy attachment", &role.policies, &patch.removed_policies)?;

        let mut steps = Vec::new();
        for &user_id in &patch.added_users {
            steps.push(Mutation::LinkRoleUser { role_id, user_id });
            steps.push(Mutation::LinkUserRole { user_id, role_id });
        }
        for &user_id in &patch.removed_users {
            steps.push(Mutation::UnlinkRoleUser { role_id, user_id });
            steps.push(Mutation::UnlinkUserRole { user_id, role_id });
        }
        if !patch.added_permissions.is_empty() {
            steps.push(Mutation::GrantPermissions {
                role_id,
                permissions: patch.added_permissions,
            });
        }
        if !patch.removed_permissions.is_empty() {
            steps.push(Mutation::RevokePermissions {
                role_id,
                permissions: patch.removed_permissions,
            });
        }
        for &policy_id in &patch.added_policies {
            steps.push(Mutation::LinkRolePolicy { role_id, policy_id });
        }
        for &policy_id in &patch.removed_policies {
            steps.push(Mutation::UnlinkRolePolicy { role_id, policy_id });
        }
        if steps.is_empty() {
            return Ok(role);
        }

        let org = self.relations(org_id).run("patch_role", steps).await?;
        found(org.role(role_id), "role", role_id)
    }

    /// Pull the role from every member's `roles`, then remove it.
    pub async fn delete_role(&self, org_id: EntityId, role_id: EntityId) -> PortcullisResult<()> {
        let org = self.load(org_id).await?;
        let role = found(org.role(role_id), "role", role_id)?;

        let members = dedup(
            role.users
                .iter()
                .copied()
                .chain(
                    org.users
                        .iter()
                        .filter(|u| u.roles.contains(&role_id))
                        .map(|u| u.id),
                )
                .collect(),
        );
        let mut steps: Vec<Mutation> = members
            .into_iter()
            .map(|user_id| Mutation::UnlinkUserRole { user_id, role_id })
            .collect();
        steps.push(Mutation::RemoveRole { role_id });

        self.relations(org_id).run("delete_role", steps).await?;
        Ok(())
    }

    // -------------------------------------------------------------------
    // Groups
    // -------------------------------------------------------------------

    pub async fn create_group(
        &self,
        org_id: EntityId,
        input: CreateGroup,
    ) -> PortcullisResult<Group> {
        require_text("identifier", &input.identifier)?;
        let org = self.load(org_id).await?;
        if org.exists_by_identifier(EntityKind::Group, &input.identifier) {
            return Err(PortcullisError::already_exists("group", input.identifier));
        }
        let users = dedup(input.users);
        ensure_exist("user", &users, |id| org.user(id).is_some())?;

        let group = Group {
            id: EntityId::new(),
            identifier: input.identifier,
            display_name: input.display_name,
            users: users.clone(),
        };
        let group_id = group.id;

        let mut steps = vec![Mutation::InsertGroup { group }];
        steps.extend(
            users
                .into_iter()
                .map(|user_id| Mutation::LinkUserGroup { user_id, group_id }),
        );

        let org = self.relations(org_id).run("create_group", steps).await?;
        found(org.group(group_id), "group", group_id)
    }

    pub async fn get_group(&self, org_id: EntityId, group_id: EntityId) -> PortcullisResult<Group> {
        let org = self.load(org_id).await?;
        found(org.group(group_id), "group", group_id)
    }

    pub async fn list_groups(
        &self,
        org_id: EntityId,
        pagination: Pagination,
    ) -> PortcullisResult<PaginatedResult<Group>> {
        Ok(pagination.apply(&self.load(org_id).await?.groups))
    }

    pub async fn update_group(
        &self,
        org_id: EntityId,
        group_id: EntityId,
        input: UpdateGroup,
    ) -> PortcullisResult<Group> {
        let Some(display_name) = input.display_name else {
            return self.get_group(org_id, group_id).await;
        };
        let org = self
            .repo
            .apply(
                org_id,
                &Mutation::UpdateGroup {
                    group_id,
                    display_name,
                },
            )
            .await?;
        found(org.group(group_id), "group", group_id)
    }

    pub async fn patch_group(
        &self,
        org_id: EntityId,
        group_id: EntityId,
        patch: PatchGroup,
    ) -> PortcullisResult<Group> {
        let org = self.load(org_id).await?;
        let group = found(org.group(group_id), "group", group_id)?;

        ensure_exist("user", &patch.added_users, |id| org.user(id).is_some())?;
        ensure_new("group membership", &group.users, &patch.added_users)?;
        ensure_present("group membership", &group.users, &patch.removed_users)?;

        let mut steps = Vec::new();
        for &user_id in &patch.added_users {
            steps.push(Mutation::LinkGroupUser { group_id, user_id });
            steps.push(Mutation::LinkUserGroup { user_id, group_id });
        }
        for &user_id in &patch.removed_users {
            steps.push(Mutation::UnlinkGroupUser { group_id, user_id });
            steps.push(Mutation::UnlinkUserGroup { user_id, group_id });
        }
        if steps.is_empty() {
            return Ok(group);
        }

        let org = self.relations(org_id).run("patch_group", steps).await?;
        found(org.group(group_id), "group", group_id)
    }

    pub async fn delete_group(&self, org_id: EntityId, group_id: EntityId) -> PortcullisResult<()> {
        let org = self.load(org_id).await?;
        let group = found(org.group(group_id), "group", group_id)?;

        let members = dedup(
            group
                .users
                .iter()
                .copied()
                .chain(
                    org.users
                        .iter()
                        .filter(|u| u.groups.contains(&group_id))
                        .map(|u| u.id),
                )
                .collect(),
        );
        let mut steps: Vec<Mutation> = members
            .into_iter()
            .map(|user_id| Mutation::UnlinkUserGroup { user_id, group_id })
            .collect();
        steps.push(Mutation::RemoveGroup { group_id });

        self.relations(org_id).run("delete_group", steps).await?;
        Ok(())
    }

    // -------------------------------------------------------------------
    // Resources
    // -------------------------------------------------------------------

    pub async fn create_resource(
        &self,
        org_id: EntityId,
        input: CreateResource,
    ) -> PortcullisResult<Resource> {
        require_text("identifier", &input.identifier)?;
        let org = self.load(org_id).await?;
        if org.resource_by_identifier(&input.identifier).is_some() {
            return Err(PortcullisError::already_exists(
                "resource",
                input.identifier,
            ));
        }

        let mut resource = Resource {
            id: EntityId::new(),
            identifier: input.identifier,
            display_name: input.display_name,
            kind: input.kind,
            actions: Vec::new(),
        };
        resource.actions = new_actions(input.actions, &resource)?;
        let resource_id = resource.id;

        let org = self
            .repo
            .apply(org_id, &Mutation::InsertResource { resource })
            .await?;
        found(org.resource(resource_id), "resource", resource_id)
    }

    pub async fn get_resource(
        &self,
        org_id: EntityId,
        resource_id: EntityId,
    ) -> PortcullisResult<Resource> {
        let org = self.load(org_id).await?;
        found(org.resource(resource_id), "resource", resource_id)
    }

    pub async fn list_resources(
        &self,
        org_id: EntityId,
        pagination: Pagination,
    ) -> PortcullisResult<PaginatedResult<Resource>> {
        Ok(pagination.apply(&self.load(org_id).await?.resources))
    }

    pub async fn update_resource(
        &self,
        org_id: EntityId,
        resource_id: EntityId,
        input: UpdateResource,
    ) -> PortcullisResult<Resource> {
        let Some(display_name) = input.display_name else {
            return self.get_resource(org_id, resource_id).await;
        };
        let org = self
            .repo
            .apply(
                org_id,
                &Mutation::UpdateResource {
                    resource_id,
                    display_name,
                },
            )
            .await?;
        found(org.resource(resource_id), "resource", resource_id)
    }

    pub async fn patch_resource(
        &self,
        org_id: EntityId,
        resource_id: EntityId,
        patch: PatchResource,
    ) -> PortcullisResult<Resource> {
        let org = self.load(org_id).await?;
        let resource = found(org.resource(resource_id), "resource", resource_id)?;

        let added = new_actions(patch.added_actions, &resource)?;
        if let Some(missing) = patch
            .removed_actions
            .iter()
            .find(|a| resource.action(a).is_none())
        {
            return Err(PortcullisError::not_found("action", missing.clone()));
        }

        let mut steps = Vec::new();
        if !added.is_empty() {
            steps.push(Mutation::AddActions {
                resource_id,
                actions: added,
            });
        }
        if !patch.removed_actions.is_empty() {
            steps.push(Mutation::RemoveActions {
                resource_id,
                identifiers: patch.removed_actions,
            });
        }
        if steps.is_empty() {
            return Ok(resource);
        }

        let org = self.relations(org_id).run("patch_resource", steps).await?;
        found(org.resource(resource_id), "resource", resource_id)
    }

    /// Permission entries naming the resource are left in place; they
    /// simply never match again.
    pub async fn delete_resource(
        &self,
        org_id: EntityId,
        resource_id: EntityId,
    ) -> PortcullisResult<()> {
        let org = self.load(org_id).await?;
        found(org.resource(resource_id), "resource", resource_id)?;
        self.repo
            .apply(org_id, &Mutation::RemoveResource { resource_id })
            .await?;
        Ok(())
    }

    // -------------------------------------------------------------------
    // Policies
    // -------------------------------------------------------------------

    /// Initial content, when given, becomes revision 1 and is active.
    pub async fn create_policy(
        &self,
        org_id: EntityId,
        input: CreatePolicy,
    ) -> PortcullisResult<Policy> {
        require_text("identifier", &input.identifier)?;
        let org = self.load(org_id).await?;
        if org.exists_by_identifier(EntityKind::Policy, &input.identifier) {
            return Err(PortcullisError::already_exists("policy", input.identifier));
        }

        let versions = match input.content {
            Some(content) => {
                require_text("content", &content)?;
                vec![PolicyVersion {
                    revision: 1,
                    content,
                    status: VersionStatus::Active,
                    created_at: Utc::now(),
                }]
            }
            None => Vec::new(),
        };
        let policy = Policy {
            id: EntityId::new(),
            identifier: input.identifier,
            display_name: input.display_name,
            versions,
        };
        let policy_id = policy.id;

        let org = self
            .repo
            .apply(org_id, &Mutation::InsertPolicy { policy })
            .await?;
        found(org.policy(policy_id), "policy", policy_id)
    }

    pub async fn get_policy(
        &self,
        org_id: EntityId,
        policy_id: EntityId,
    ) -> PortcullisResult<Policy> {
        let org = self.load(org_id).await?;
        found(org.policy(policy_id), "policy", policy_id)
    }

    pub async fn list_policies(
        &self,
        org_id: EntityId,
        pagination: Pagination,
    ) -> PortcullisResult<PaginatedResult<Policy>> {
        Ok(pagination.apply(&self.load(org_id).await?.policies))
    }

    pub async fn add_policy_version(
        &self,
        org_id: EntityId,
        policy_id: EntityId,
        input: NewPolicyVersion,
    ) -> PortcullisResult<Policy> {
        require_text("content", &input.content)?;
        let org = self.load(org_id).await?;
        let policy = found(org.policy(policy_id), "policy", policy_id)?;

        let version = PolicyVersion {
            revision: policy.next_revision(),
            content: input.content,
            status: VersionStatus::Inactive,
            created_at: Utc::now(),
        };
        let org = self
            .repo
            .apply(
                org_id,
                &Mutation::AddPolicyVersion {
                    policy_id,
                    version,
                    activate: input.activate,
                },
            )
            .await?;
        found(org.policy(policy_id), "policy", policy_id)
    }

    /// Make `revision` the single active version.
    pub async fn activate_policy_version(
        &self,
        org_id: EntityId,
        policy_id: EntityId,
        revision: u32,
    ) -> PortcullisResult<Policy> {
        let org = self
            .repo
            .apply(
                org_id,
                &Mutation::ActivatePolicyVersion {
                    policy_id,
                    revision,
                },
            )
            .await?;
        found(org.policy(policy_id), "policy", policy_id)
    }

    /// Detach the policy from every user and role, then remove it.
    pub async fn delete_policy(
        &self,
        org_id: EntityId,
        policy_id: EntityId,
    ) -> PortcullisResult<()> {
        let org = self.load(org_id).await?;
        found(org.policy(policy_id), "policy", policy_id)?;

        let mut steps: Vec<Mutation> = org
            .users
            .iter()
            .filter(|u| u.policies.contains(&policy_id))
            .map(|u| Mutation::UnlinkUserPolicy {
                user_id: u.id,
                policy_id,
            })
            .collect();
        steps.extend(
            org.roles
                .iter()
                .filter(|r| r.policies.contains(&policy_id))
                .map(|r| Mutation::UnlinkRolePolicy {
                    role_id: r.id,
                    policy_id,
                }),
        );
        steps.push(Mutation::RemovePolicy { policy_id });

        self.relations(org_id).run("delete_policy", steps).await?;
        Ok(())
    }

    // -------------------------------------------------------------------
    // API keys
    // -------------------------------------------------------------------

    /// The raw key in the result is not stored and cannot be recovered.
    pub async fn issue_api_key(
        &self,
        org_id: EntityId,
        input: CreateApiKey,
    ) -> PortcullisResult<IssuedApiKey> {
        require_text("name", &input.name)?;
        let org = self.load(org_id).await?;
        if org.exists_by_identifier(EntityKind::ApiKey, &input.name) {
            return Err(PortcullisError::already_exists("api_key", input.name));
        }

        let issued = credential::issue(&input.name);
        self.repo
            .apply(
                org_id,
                &Mutation::InsertApiKey {
                    api_key: issued.api_key.clone(),
                },
            )
            .await?;
        info!(
            organization_id = %org_id,
            name = %issued.api_key.name,
            prefix = %issued.api_key.prefix,
            "Issued API key"
        );
        Ok(issued)
    }

    pub async fn list_api_keys(&self, org_id: EntityId) -> PortcullisResult<Vec<ApiKey>> {
        Ok(self.load(org_id).await?.api_keys)
    }

    pub async fn revoke_api_key(
        &self,
        org_id: EntityId,
        api_key_id: EntityId,
    ) -> PortcullisResult<()> {
        let org = self.load(org_id).await?;
        found(org.api_key(api_key_id), "api_key", api_key_id)?;
        self.repo
            .apply(org_id, &Mutation::RemoveApiKey { api_key_id })
            .await?;
        info!(organization_id = %org_id, %api_key_id, "Revoked API key");
        Ok(())
    }

    // -------------------------------------------------------------------
    // Reconciliation
    // -------------------------------------------------------------------

    /// Replay every queued repair for the tenant. Returns how many were
    /// completed and cleared.
    ///
    /// A step whose target entity has since been deleted is skipped. Any
    /// other failure stops the run and leaves that repair queued.
    pub async fn reconcile(&self, org_id: EntityId) -> PortcullisResult<usize> {
        let repairs = self.repo.list_repairs(org_id).await?;
        let mut completed = 0;

        for repair in repairs {
            for step in &repair.mutations {
                match self.repo.apply(org_id, step).await {
                    Ok(_) => {}
                    Err(PortcullisError::NotFound { entity, id }) => {
                        warn!(
                            organization_id = %org_id,
                            repair_id = %repair.id,
                            %step,
                            %entity,
                            %id,
                            "Repair target no longer exists, skipping step"
                        );
                    }
                    Err(err) => return Err(err),
                }
            }
            self.repo.clear_repair(org_id, &repair.id).await?;
            info!(
                organization_id = %org_id,
                repair_id = %repair.id,
                steps = repair.mutations.len(),
                "Reconciled pending repair"
            );
            completed += 1;
        }

        Ok(completed)
    }
}
