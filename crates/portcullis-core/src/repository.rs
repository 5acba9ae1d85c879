//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. A tenant is stored as one
//! aggregate document, so there is a single repository for it; every
//! change to embedded entities goes through [`OrganizationRepository::apply`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PortcullisResult;
use crate::id::EntityId;
use crate::models::organization::{
    CreateOrganization, EntityKind, Organization, OrganizationSummary,
};
use crate::mutation::Mutation;

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

impl Pagination {
    /// Slice an in-memory collection.
    pub fn apply<T: Clone>(&self, items: &[T]) -> PaginatedResult<T> {
        let start = usize::try_from(self.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(self.limit).unwrap_or(usize::MAX);
        PaginatedResult {
            items: items.iter().skip(start).take(limit).cloned().collect(),
            total: items.len() as u64,
            offset: self.offset,
            limit: self.limit,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

/// Sub-operations left unapplied when a multi-step write was
/// interrupted. Replaying them in order completes the original write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRepair {
    pub id: String,
    pub organization_id: EntityId,
    pub mutations: Vec<Mutation>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

pub trait OrganizationRepository: Send + Sync {
    fn create(
        &self,
        input: CreateOrganization,
    ) -> impl Future<Output = PortcullisResult<Organization>> + Send;
    fn get_by_id(
        &self,
        id: EntityId,
    ) -> impl Future<Output = PortcullisResult<Organization>> + Send;
    fn get_by_identifier(
        &self,
        identifier: &str,
    ) -> impl Future<Output = PortcullisResult<Organization>> + Send;
    /// Whether an embedded entity with this id exists in the tenant.
    fn exists_by_id(
        &self,
        org_id: EntityId,
        kind: EntityKind,
        id: EntityId,
    ) -> impl Future<Output = PortcullisResult<bool>> + Send;
    fn exists_by_identifier(
        &self,
        org_id: EntityId,
        kind: EntityKind,
        identifier: &str,
    ) -> impl Future<Output = PortcullisResult<bool>> + Send;
    fn delete(&self, id: EntityId) -> impl Future<Output = PortcullisResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = PortcullisResult<PaginatedResult<OrganizationSummary>>> + Send;

    /// Atomically apply one sub-operation to the tenant document and
    /// return the new state.
    fn apply(
        &self,
        org_id: EntityId,
        mutation: &Mutation,
    ) -> impl Future<Output = PortcullisResult<Organization>> + Send;

    fn record_repair(
        &self,
        org_id: EntityId,
        mutations: &[Mutation],
        reason: &str,
    ) -> impl Future<Output = PortcullisResult<PendingRepair>> + Send;
    fn list_repairs(
        &self,
        org_id: EntityId,
    ) -> impl Future<Output = PortcullisResult<Vec<PendingRepair>>> + Send;
    fn clear_repair(
        &self,
        org_id: EntityId,
        repair_id: &str,
    ) -> impl Future<Output = PortcullisResult<()>> + Send;
}
