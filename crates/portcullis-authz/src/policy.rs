//! Attribute policy evaluation.
//!
//! Every policy attached to a principal, directly or through one of its
//! roles, must evaluate to `true` for the request to stand. Only the
//! active version of each policy is evaluated; policies without one are
//! skipped.

use std::collections::HashSet;
use std::sync::Arc;

use portcullis_core::error::{PortcullisError, PortcullisResult};
use portcullis_core::evaluator::PolicyEvaluator;
use portcullis_core::id::EntityId;
use portcullis_core::models::attribute::{AttributeMap, canonical_json};
use portcullis_core::models::organization::Organization;
use portcullis_core::models::user::User;
use tracing::debug;

use crate::config::AuthzConfig;
use crate::error::AuthzError;

/// The principal's policy set: `user.policies` followed by the policies
/// of each held role, first occurrence wins.
pub fn principal_policies(org: &Organization, user: &User) -> Vec<EntityId> {
    let mut seen = HashSet::new();
    let role_policies = user
        .roles
        .iter()
        .filter_map(|id| org.role(*id))
        .flat_map(|role| role.policies.iter());

    user.policies
        .iter()
        .chain(role_policies)
        .filter(|id| seen.insert(**id))
        .copied()
        .collect()
}

/// Runs a principal's active policy versions through a [`PolicyEvaluator`].
pub struct PolicyAdapter<E: PolicyEvaluator> {
    evaluator: E,
}

impl<E: PolicyEvaluator> PolicyAdapter<E> {
    pub fn new(evaluator: E) -> Self {
        Self { evaluator }
    }

    /// `Ok(true)` when every active policy in `policy_ids` permits the
    /// request, including the empty set. Stops at the first `false`.
    pub async fn evaluate(
        &self,
        org: &Organization,
        policy_ids: &[EntityId],
        attributes: &AttributeMap,
    ) -> PortcullisResult<bool> {
        let contents: Vec<(&str, &str)> = policy_ids
            .iter()
            .filter_map(|id| org.policy(*id))
            .filter_map(|p| {
                p.active_version()
                    .map(|v| (p.identifier.as_str(), v.content.as_str()))
            })
            .collect();
        if contents.is_empty() {
            return Ok(true);
        }

        let attributes_json = canonical_json(attributes)
            .map_err(|e| PortcullisError::from(AuthzError::Attributes(e.to_string())))?;

        for (identifier, content) in contents {
            if !self.evaluator.evaluate(content, &attributes_json).await? {
                debug!(policy = identifier, "Policy vetoed request");
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// [`PolicyEvaluator`] backed by the regorus Rego interpreter.
///
/// Each policy version is a self-contained Rego module. The attributes
/// become `input` and the configured boolean query decides.
#[derive(Debug, Clone)]
pub struct RegoEvaluator {
    query: Arc<str>,
}

impl RegoEvaluator {
    pub fn new(config: &AuthzConfig) -> Self {
        Self {
            query: Arc::from(config.policy_query.as_str()),
        }
    }
}

impl Default for RegoEvaluator {
    fn default() -> Self {
        Self::new(&AuthzConfig::default())
    }
}

impl PolicyEvaluator for RegoEvaluator {
    async fn evaluate(&self, policy_content: &str, attributes_json: &str) -> PortcullisResult<bool> {
        let policy = policy_content.to_owned();
        let input = attributes_json.to_owned();
        let query = Arc::clone(&self.query);

        // Interpretation is CPU-bound; a dropped caller leaves the task
        // to finish on the blocking pool and its result is discarded.
        let verdict = tokio::task::spawn_blocking(move || eval_rego(&policy, &input, &query))
            .await
            .map_err(|e| AuthzError::PolicyTask(e.to_string()))??;
        Ok(verdict)
    }
}

fn eval_rego(policy: &str, input: &str, query: &str) -> Result<bool, AuthzError> {
    let mut engine = regorus::Engine::new();
    engine
        .add_policy("policy.rego".to_string(), policy.to_string())
        .map_err(|e| AuthzError::PolicyEvaluation(e.to_string()))?;
    let input = regorus::Value::from_json_str(input)
        .map_err(|e| AuthzError::PolicyEvaluation(e.to_string()))?;
    engine.set_input(input);
    engine
        .eval_bool_query(query.to_string(), false)
        .map_err(|e| AuthzError::PolicyEvaluation(e.to_string()))
}
