//! Portcullis Authz: tenant administration and authorization decisions.
//!
//! - [`TenantStore`]: invariant-preserving mutations of the tenant
//!   aggregate, including bidirectional links and cascades
//! - [`rbac`]: effective permissions from role membership
//! - [`PolicyAdapter`] and [`RegoEvaluator`]: attribute policy vetoes
//! - [`HttpRelationshipClient`]: the external relationship graph
//! - [`DecisionEngine`]: the credential-gated `check` entry point

pub mod config;
pub mod credential;
pub mod decision;
pub mod engine;
pub mod error;
pub mod policy;
pub mod rbac;
pub mod relationship;
pub mod tenant;

pub use config::{AuthzConfig, RelationshipConfig};
pub use engine::{CheckRequest, CheckResponse, DecisionEngine};
pub use error::AuthzError;
pub use policy::{PolicyAdapter, RegoEvaluator};
pub use relationship::HttpRelationshipClient;
pub use tenant::TenantStore;
