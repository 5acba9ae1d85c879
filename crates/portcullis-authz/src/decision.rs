//! Final combination of the RBAC verdict and the policy veto.

/// `allowed = rbac && !vetoed`.
///
/// An attribute policy can only take a grant away; it never grants on
/// its own.
pub fn combine(rbac_allowed: bool, policy_vetoed: bool) -> bool {
    rbac_allowed && !policy_vetoed
}
