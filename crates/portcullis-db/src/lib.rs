//! Portcullis Database: SurrealDB connection management and the
//! tenant aggregate repository.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Error types ([`DbError`])
//! - [`repository::SurrealOrganizationRepository`], the implementation of
//!   `portcullis_core::repository::OrganizationRepository`

mod connection;
mod error;
pub mod repository;
mod schema;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use schema::{run_migrations, schema_v1};
