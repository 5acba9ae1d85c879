//! The authorization decision engine.
//!
//! `check` answers "may user U perform action A on resource R in tenant
//! T?" in a fixed order: input validation, credential gate, context
//! load, RBAC, policy veto, combination. The tenant aggregate is read
//! once, so every step sees the same snapshot. A denial is a successful
//! `CheckResponse { allowed: false }`, never an error.

use portcullis_core::error::{PortcullisError, PortcullisResult};
use portcullis_core::evaluator::PolicyEvaluator;
use portcullis_core::models::organization::Organization;
use portcullis_core::models::resource::ResourceKind;
use portcullis_core::relationship::{RelationshipClient, RelationshipFilter, RelationshipTuple};
use portcullis_core::repository::OrganizationRepository;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::credential;
use crate::decision;
use crate::error::AuthzError;
use crate::policy::{PolicyAdapter, principal_policies};
use crate::rbac;
use crate::relationship::HttpRelationshipClient;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRequest {
    /// Username of the principal.
    pub identifier: String,
    pub action: String,
    pub resource: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResponse {
    pub allowed: bool,
}

/// Credential-gated authorization over one tenant store.
///
/// `skip_credential_validation` is for trusted internal callers that
/// already authenticated the request; it also skips the policy veto.
pub struct DecisionEngine<R, E, G = HttpRelationshipClient>
where
    R: OrganizationRepository,
    E: PolicyEvaluator,
    G: RelationshipClient,
{
    repo: R,
    policies: PolicyAdapter<E>,
    relationships: Option<G>,
}

impl<R, E> DecisionEngine<R, E>
where
    R: OrganizationRepository,
    E: PolicyEvaluator,
{
    pub fn new(repo: R, evaluator: E) -> Self {
        Self {
            repo,
            policies: PolicyAdapter::new(evaluator),
            relationships: None,
        }
    }
}

impl<R, E, G> DecisionEngine<R, E, G>
where
    R: OrganizationRepository,
    E: PolicyEvaluator,
    G: RelationshipClient,
{
    /// Attach a relationship graph client for the ReBAC entry points.
    pub fn with_relationships<G2: RelationshipClient>(self, client: G2) -> DecisionEngine<R, E, G2> {
        DecisionEngine {
            repo: self.repo,
            policies: self.policies,
            relationships: Some(client),
        }
    }

    pub async fn check(
        &self,
        tenant: &str,
        request: &CheckRequest,
        credential: &str,
        skip_credential_validation: bool,
    ) -> PortcullisResult<CheckResponse> {
        require("organization", tenant)?;
        require("identifier", &request.identifier)?;
        require("action", &request.action)?;
        require("resource", &request.resource)?;

        let org = self
            .load_tenant(tenant, credential, skip_credential_validation)
            .await?;
        let user = org
            .user_by_username(&request.identifier)
            .ok_or_else(|| PortcullisError::not_found("user", &request.identifier))?;

        let rbac_allowed = rbac::check(&org, &user.roles, &request.resource, &request.action);

        let vetoed = if skip_credential_validation {
            false
        } else {
            let policy_ids = principal_policies(&org, user);
            !self
                .policies
                .evaluate(&org, &policy_ids, &user.user_properties)
                .await?
        };

        let allowed = decision::combine(rbac_allowed, vetoed);
        debug!(
            organization = tenant,
            user = %request.identifier,
            resource = %request.resource,
            action = %request.action,
            rbac_allowed,
            vetoed,
            allowed,
            "Check decided"
        );
        Ok(CheckResponse { allowed })
    }

    pub async fn check_relationship(
        &self,
        tenant: &str,
        tuple: &RelationshipTuple,
        credential: &str,
        skip_credential_validation: bool,
    ) -> PortcullisResult<CheckResponse> {
        require_tuple(tuple)?;
        let org = self
            .load_tenant(tenant, credential, skip_credential_validation)
            .await?;
        ensure_relationship_object(&org, &tuple.object)?;

        let allowed = self.client()?.check(tuple).await?;
        debug!(
            organization = tenant,
            subject = %tuple.subject,
            relation = %tuple.relation,
            object = %tuple.object,
            allowed,
            "Relationship check decided"
        );
        Ok(CheckResponse { allowed })
    }

    pub async fn write_relationship(
        &self,
        tenant: &str,
        tuple: &RelationshipTuple,
        credential: &str,
        skip_credential_validation: bool,
    ) -> PortcullisResult<()> {
        require_tuple(tuple)?;
        let org = self
            .load_tenant(tenant, credential, skip_credential_validation)
            .await?;
        ensure_relationship_object(&org, &tuple.object)?;
        self.client()?.write(tuple).await
    }

    pub async fn read_relationships(
        &self,
        tenant: &str,
        filter: &RelationshipFilter,
        credential: &str,
        skip_credential_validation: bool,
    ) -> PortcullisResult<Vec<RelationshipTuple>> {
        require("organization", tenant)?;
        let org = self
            .load_tenant(tenant, credential, skip_credential_validation)
            .await?;
        if let Some(object) = &filter.object {
            ensure_relationship_object(&org, object)?;
        }
        self.client()?.read(filter).await
    }

    fn client(&self) -> PortcullisResult<&G> {
        self.relationships
            .as_ref()
            .ok_or_else(|| AuthzError::RelationshipUnconfigured.into())
    }

    /// Load the tenant and, unless skipped, validate the credential
    /// against its API keys. An unknown tenant behind the gate is
    /// reported as a bad credential.
    async fn load_tenant(
        &self,
        tenant: &str,
        credential: &str,
        skip_credential_validation: bool,
    ) -> PortcullisResult<Organization> {
        if skip_credential_validation {
            return self.repo.get_by_identifier(tenant).await;
        }

        let org = match self.repo.get_by_identifier(tenant).await {
            Ok(org) => org,
            Err(PortcullisError::NotFound { .. }) => {
                warn!(organization = tenant, "Rejected API key for unknown organization");
                return Err(AuthzError::InvalidApiKey.into());
            }
            Err(e) => return Err(e),
        };
        if !credential::verify(credential, &org.api_keys) {
            warn!(organization = tenant, "Rejected API key");
            return Err(AuthzError::InvalidApiKey.into());
        }
        Ok(org)
    }
}

fn require(field: &str, value: &str) -> PortcullisResult<()> {
    if value.is_empty() {
        return Err(PortcullisError::invalid_input(format!(
            "{field} must not be empty"
        )));
    }
    Ok(())
}

fn require_tuple(tuple: &RelationshipTuple) -> PortcullisResult<()> {
    require("subject", &tuple.subject)?;
    require("relation", &tuple.relation)?;
    require("object", &tuple.object)
}

/// Objects are `<resource>` or `<resource>:<instance>`; the resource
/// must exist in the tenant and be relationship-managed.
fn ensure_relationship_object(org: &Organization, object: &str) -> PortcullisResult<()> {
    let resource = object.split_once(':').map_or(object, |(r, _)| r);
    match org.resource_by_identifier(resource) {
        Some(r) if r.kind == ResourceKind::Relationship => Ok(()),
        Some(_) => Err(PortcullisError::invalid_input(format!(
            "resource '{resource}' is not relationship-managed"
        ))),
        None => Err(PortcullisError::invalid_input(format!(
            "'{object}' does not name a relationship resource"
        ))),
    }
}
