//! Database-specific error types and conversions.

use portcullis_core::error::PortcullisError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Corrupt stored document: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Record already exists: {entity} {id}")]
    AlreadyExists { entity: String, id: String },

    #[error("Write to {entity} {id} lost the revision race {attempts} times")]
    Conflict {
        entity: String,
        id: String,
        attempts: u32,
    },
}

impl From<DbError> for PortcullisError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => PortcullisError::NotFound { entity, id },
            DbError::AlreadyExists { entity, id } => PortcullisError::AlreadyExists { entity, id },
            other => PortcullisError::Infrastructure(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_keeps_its_kind() {
        let err: PortcullisError = DbError::NotFound {
            entity: "organization".into(),
            id: "org1".into(),
        }
        .into();
        assert!(matches!(err, PortcullisError::NotFound { .. }));
    }

    #[test]
    fn unique_violation_is_already_exists() {
        let err: PortcullisError = DbError::AlreadyExists {
            entity: "organization".into(),
            id: "org1".into(),
        }
        .into();
        assert!(matches!(err, PortcullisError::AlreadyExists { .. }));
    }

    #[test]
    fn conflict_is_infrastructure() {
        let err: PortcullisError = DbError::Conflict {
            entity: "organization".into(),
            id: "x".into(),
            attempts: 3,
        }
        .into();
        assert!(matches!(err, PortcullisError::Infrastructure(_)));
    }
}
