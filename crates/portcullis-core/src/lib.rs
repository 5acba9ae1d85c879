//! Portcullis core: domain models, the error taxonomy, and the contracts
//! (repository, policy evaluator, relationship graph) the other crates
//! implement. Nothing in here performs I/O.

pub mod error;
pub mod evaluator;
pub mod id;
pub mod models;
pub mod mutation;
pub mod relationship;
pub mod repository;

pub use error::{PortcullisError, PortcullisResult};
pub use id::EntityId;
