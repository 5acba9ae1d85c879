//! SurrealDB implementation of [`OrganizationRepository`].
//!
//! The aggregate is stored as one record keyed by the organization id.
//! Writes are a compare-and-swap on `revision`: load, apply the mutation
//! in memory, then `UPDATE ... WHERE revision = $revision`. Losing the
//! race reloads and retries up to the configured bound. SurrealDB's own
//! "transaction conflict" on a concurrently written record counts as a
//! lost race too.

use std::time::Duration;

use chrono::{DateTime, Utc};
use portcullis_core::error::{PortcullisError, PortcullisResult};
use portcullis_core::id::EntityId;
use portcullis_core::models::organization::{
    CreateOrganization, EntityKind, Organization, OrganizationSummary,
};
use portcullis_core::mutation::Mutation;
use portcullis_core::repository::{
    OrganizationRepository, PaginatedResult, Pagination, PendingRepair,
};
use serde::Serialize;
use rand::Rng;
use serde::de::DeserializeOwned;
use surrealdb::{Connection, IndexedResults, Surreal};
use surrealdb_types::{QueryError, SurrealValue};
use tracing::{debug, warn};

use crate::error::DbError;

pub(crate) const DEFAULT_WRITE_RETRIES: u32 = 8;
const IDENTIFIER_INDEX: &str = "idx_organization_identifier";

/// DB-side row struct for queries where the id is already known.
#[derive(Debug, SurrealValue)]
struct OrganizationRow {
    identifier: String,
    display_name: String,
    users: serde_json::Value,
    roles: serde_json::Value,
    groups: serde_json::Value,
    resources: serde_json::Value,
    policies: serde_json::Value,
    api_keys: serde_json::Value,
    revision: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrganizationRow {
    fn into_organization(self, id: EntityId) -> Result<Organization, DbError> {
        Ok(Organization {
            id,
            identifier: self.identifier,
            display_name: self.display_name,
            users: decode(self.users)?,
            roles: decode(self.roles)?,
            groups: decode(self.groups)?,
            resources: decode(self.resources)?,
            policies: decode(self.policies)?,
            api_keys: decode(self.api_keys)?,
            revision: self.revision,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct OrganizationRowWithId {
    record_id: String,
    identifier: String,
    display_name: String,
    users: serde_json::Value,
    roles: serde_json::Value,
    groups: serde_json::Value,
    resources: serde_json::Value,
    policies: serde_json::Value,
    api_keys: serde_json::Value,
    revision: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrganizationRowWithId {
    fn try_into_organization(self) -> Result<Organization, DbError> {
        let id = parse_record_id(&self.record_id)?;
        OrganizationRow {
            identifier: self.identifier,
            display_name: self.display_name,
            users: self.users,
            roles: self.roles,
            groups: self.groups,
            resources: self.resources,
            policies: self.policies,
            api_keys: self.api_keys,
            revision: self.revision,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_organization(id)
    }
}

#[derive(Debug, SurrealValue)]
struct SummaryRow {
    record_id: String,
    identifier: String,
    display_name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct RepairRow {
    record_id: String,
    organization_id: String,
    mutations: serde_json::Value,
    reason: String,
    created_at: DateTime<Utc>,
}

impl RepairRow {
    fn try_into_repair(self) -> Result<PendingRepair, DbError> {
        Ok(PendingRepair {
            id: self.record_id,
            organization_id: parse_record_id(&self.organization_id)?,
            mutations: decode(self.mutations)?,
            reason: self.reason,
            created_at: self.created_at,
        })
    }
}

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn decode<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, DbError> {
    match value {
        serde_json::Value::Null => serde_json::from_value(serde_json::Value::Array(vec![])),
        other => serde_json::from_value(other),
    }
    .map_err(DbError::from)
}

fn encode<T: Serialize>(value: &T) -> Result<serde_json::Value, DbError> {
    serde_json::to_value(value).map_err(DbError::from)
}

fn parse_record_id(raw: &str) -> Result<EntityId, DbError> {
    EntityId::parse(raw).map_err(|e| DbError::Query(format!("invalid record id: {e}")))
}

/// SurrealDB rejects the losing side of two transactions touching the
/// same key with a retryable conflict. Embedded engines do not always
/// attach the structured detail, so the message is checked as well.
fn is_transaction_conflict(err: &surrealdb::Error) -> bool {
    matches!(err.query_details(), Some(QueryError::TransactionConflict))
        || err.message().contains("can be retried")
}

/// Result of a write statement that may have lost a race.
enum Write<T> {
    Done(T),
    Lost,
}

/// Execute a prepared write, turning a transaction conflict into
/// [`Write::Lost`] whether it surfaces from the call or from
/// the statement result.
async fn execute<F>(query: F) -> Result<Write<IndexedResults>, DbError>
where
    F: std::future::IntoFuture<Output = Result<IndexedResults, surrealdb::Error>>,
{
    let response = match query.await {
        Ok(response) => response,
        Err(e) if is_transaction_conflict(&e) => return Ok(Write::Lost),
        Err(e) => return Err(e.into()),
    };
    match response.check() {
        Ok(checked) => Ok(Write::Done(checked)),
        Err(e) if is_transaction_conflict(&e) => Ok(Write::Lost),
        Err(e) => Err(DbError::Query(e.to_string())),
    }
}

/// Jittered exponential pause between attempts, capped at 64ms base.
async fn backoff(attempt: u32) {
    let base = 1u64 << attempt.min(6);
    let jitter = rand::rng().random_range(0..=base);
    tokio::time::sleep(Duration::from_millis(base + jitter)).await;
}

fn org_not_found(id: impl Into<String>) -> DbError {
    DbError::NotFound {
        entity: "organization".into(),
        id: id.into(),
    }
}

/// SurrealDB implementation of the Organization repository.
pub struct SurrealOrganizationRepository<C: Connection> {
    db: Surreal<C>,
    write_retries: u32,
}

impl<C: Connection> Clone for SurrealOrganizationRepository<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            write_retries: self.write_retries,
        }
    }
}

impl<C: Connection> SurrealOrganizationRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            db,
            write_retries: DEFAULT_WRITE_RETRIES,
        }
    }

    /// Override the compare-and-swap retry bound.
    pub fn with_write_retries(mut self, write_retries: u32) -> Self {
        self.write_retries = write_retries.max(1);
        self
    }

    /// Persist `org` if the stored revision still equals `org.revision`.
    /// Returns `None` when another writer got there first.
    async fn compare_and_swap(&self, org: &Organization) -> Result<Option<Organization>, DbError> {
        let id_str = org.id.to_hex();
        let query = self
            .db
            .query(
                "UPDATE type::record('organization', $id) SET \
                 display_name = $display_name, users = $users, roles = $roles, \
                 groups = $groups, resources = $resources, policies = $policies, \
                 api_keys = $api_keys, revision = $next, updated_at = time::now() \
                 WHERE revision = $revision",
            )
            .bind(("id", id_str))
            .bind(("display_name", org.display_name.clone()))
            .bind(("users", encode(&org.users)?))
            .bind(("roles", encode(&org.roles)?))
            .bind(("groups", encode(&org.groups)?))
            .bind(("resources", encode(&org.resources)?))
            .bind(("policies", encode(&org.policies)?))
            .bind(("api_keys", encode(&org.api_keys)?))
            .bind(("revision", org.revision))
            .bind(("next", org.revision + 1));

        let mut result = match execute(query).await? {
            Write::Done(result) => result,
            Write::Lost => return Ok(None),
        };
        let rows: Vec<OrganizationRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(|row| row.into_organization(org.id))
            .transpose()
    }

    /// Insert a fresh organization record. A hit on the identifier index
    /// means a concurrent create with the same identifier won.
    async fn insert(&self, org: &Organization) -> Result<Write<Organization>, DbError> {
        let id_str = org.id.to_hex();
        let query = self
            .db
            .query(
                "CREATE type::record('organization', $id) SET \
                 identifier = $identifier, display_name = $display_name, \
                 users = [], roles = [], groups = [], resources = [], \
                 policies = [], api_keys = [], revision = 0",
            )
            .bind(("id", id_str.clone()))
            .bind(("identifier", org.identifier.clone()))
            .bind(("display_name", org.display_name.clone()));

        let mut result = match execute(query).await {
            Ok(Write::Done(result)) => result,
            Ok(Write::Lost) => return Ok(Write::Lost),
            Err(e @ (DbError::Query(_) | DbError::Surreal(_)))
                if e.to_string().contains(IDENTIFIER_INDEX) =>
            {
                return Err(DbError::AlreadyExists {
                    entity: "organization".into(),
                    id: org.identifier.clone(),
                });
            }
            Err(e) => return Err(e),
        };
        let rows: Vec<OrganizationRow> = result.take(0)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| org_not_found(id_str))?;
        Ok(Write::Done(row.into_organization(org.id)?))
    }

    async fn load(&self, id: EntityId) -> Result<Organization, DbError> {
        let id_str = id.to_hex();
        let mut result = self
            .db
            .query("SELECT * FROM type::record('organization', $id)")
            .bind(("id", id_str.clone()))
            .await?;

        let rows: Vec<OrganizationRow> = result.take(0)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| org_not_found(id_str))?;
        row.into_organization(id)
    }
}

impl<C: Connection> OrganizationRepository for SurrealOrganizationRepository<C> {
    async fn create(&self, input: CreateOrganization) -> PortcullisResult<Organization> {
        let org = Organization::new(input);

        for attempt in 1..=self.write_retries {
            match self.get_by_identifier(&org.identifier).await {
                Ok(_) => {
                    return Err(PortcullisError::already_exists(
                        "organization",
                        org.identifier,
                    ));
                }
                Err(PortcullisError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }

            match self.insert(&org).await? {
                Write::Done(created) => return Ok(created),
                Write::Lost => {
                    warn!(
                        identifier = %org.identifier,
                        attempt,
                        "Transaction conflict creating organization, retrying"
                    );
                    backoff(attempt).await;
                }
            }
        }

        Err(DbError::Conflict {
            entity: "organization".into(),
            id: org.identifier,
            attempts: self.write_retries,
        }
        .into())
    }

    async fn get_by_id(&self, id: EntityId) -> PortcullisResult<Organization> {
        Ok(self.load(id).await?)
    }

    async fn get_by_identifier(&self, identifier: &str) -> PortcullisResult<Organization> {
        let identifier_owned = identifier.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM organization WHERE identifier = $identifier",
            )
            .bind(("identifier", identifier_owned))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OrganizationRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| org_not_found(format!("identifier={identifier}")))?;

        Ok(row.try_into_organization()?)
    }

    async fn exists_by_id(
        &self,
        org_id: EntityId,
        kind: EntityKind,
        id: EntityId,
    ) -> PortcullisResult<bool> {
        Ok(self.load(org_id).await?.exists_by_id(kind, id))
    }

    async fn exists_by_identifier(
        &self,
        org_id: EntityId,
        kind: EntityKind,
        identifier: &str,
    ) -> PortcullisResult<bool> {
        Ok(self
            .load(org_id)
            .await?
            .exists_by_identifier(kind, identifier))
    }

    async fn delete(&self, id: EntityId) -> PortcullisResult<()> {
        self.db
            .query(
                "DELETE type::record('organization', $id); \
                 DELETE pending_repair WHERE organization_id = $id",
            )
            .bind(("id", id.to_hex()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list(
        &self,
        pagination: Pagination,
    ) -> PortcullisResult<PaginatedResult<OrganizationSummary>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM organization GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, identifier, display_name, \
                 created_at, updated_at \
                 FROM organization \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SummaryRow> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| {
                Ok(OrganizationSummary {
                    id: parse_record_id(&row.record_id)?,
                    identifier: row.identifier,
                    display_name: row.display_name,
                    created_at: row.created_at,
                    updated_at: row.updated_at,
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn apply(&self, org_id: EntityId, mutation: &Mutation) -> PortcullisResult<Organization> {
        for attempt in 1..=self.write_retries {
            let mut org = self.load(org_id).await?;
            org.apply(mutation)?;

            if let Some(saved) = self.compare_and_swap(&org).await? {
                debug!(
                    organization_id = %org_id,
                    revision = saved.revision,
                    %mutation,
                    "Applied mutation"
                );
                return Ok(saved);
            }

            warn!(
                organization_id = %org_id,
                attempt,
                %mutation,
                "Revision conflict, retrying"
            );
            backoff(attempt).await;
        }

        Err(DbError::Conflict {
            entity: "organization".into(),
            id: org_id.to_hex(),
            attempts: self.write_retries,
        }
        .into())
    }

    async fn record_repair(
        &self,
        org_id: EntityId,
        mutations: &[Mutation],
        reason: &str,
    ) -> PortcullisResult<PendingRepair> {
        let id = EntityId::new().to_hex();

        let result = self
            .db
            .query(
                "CREATE type::record('pending_repair', $id) SET \
                 organization_id = $organization_id, mutations = $mutations, \
                 reason = $reason",
            )
            .bind(("id", id.clone()))
            .bind(("organization_id", org_id.to_hex()))
            .bind(("mutations", encode(&mutations)?))
            .bind(("reason", reason.to_string()))
            .await
            .map_err(DbError::from)?;
        result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('pending_repair', $id)",
            )
            .bind(("id", id.clone()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<RepairRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "pending_repair".into(),
            id,
        })?;

        Ok(row.try_into_repair()?)
    }

    async fn list_repairs(&self, org_id: EntityId) -> PortcullisResult<Vec<PendingRepair>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM pending_repair \
                 WHERE organization_id = $organization_id \
                 ORDER BY created_at ASC",
            )
            .bind(("organization_id", org_id.to_hex()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RepairRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(RepairRow::try_into_repair)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn clear_repair(&self, org_id: EntityId, repair_id: &str) -> PortcullisResult<()> {
        self.db
            .query(
                "DELETE type::record('pending_repair', $id) \
                 WHERE organization_id = $organization_id",
            )
            .bind(("id", repair_id.to_string()))
            .bind(("organization_id", org_id.to_hex()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }
}
