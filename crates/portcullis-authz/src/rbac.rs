//! Role-based permission resolution.
//!
//! A principal's effective permissions are the union of the permission
//! entries of every role it holds. Matching is exact string equality on
//! `(resource, action)`: no wildcards, no role hierarchy.

use std::collections::HashSet;

use portcullis_core::id::EntityId;
use portcullis_core::models::organization::Organization;
use portcullis_core::models::role::Permission;

/// Union of the permissions of `role_ids`. Ids that no longer resolve
/// to a role contribute nothing.
pub fn resolve_effective_permissions(
    org: &Organization,
    role_ids: &[EntityId],
) -> HashSet<Permission> {
    role_ids
        .iter()
        .filter_map(|id| org.role(*id))
        .flat_map(|role| role.permissions.iter().cloned())
        .collect()
}

pub fn is_allowed(permissions: &HashSet<Permission>, resource: &str, action: &str) -> bool {
    permissions
        .iter()
        .any(|p| p.resource == resource && p.action == action)
}

/// RBAC verdict for one request. Zero roles means deny, and so does a
/// permission entry whose resource or action has since been deleted.
pub fn check(org: &Organization, role_ids: &[EntityId], resource: &str, action: &str) -> bool {
    if role_ids.is_empty() || !org.action_exists(resource, action) {
        return false;
    }
    is_allowed(
        &resolve_effective_permissions(org, role_ids),
        resource,
        action,
    )
}
