//! SurrealDB repository implementations.

mod organization;

pub(crate) use organization::DEFAULT_WRITE_RETRIES;
pub use organization::SurrealOrganizationRepository;
