//! Error types for Portcullis.
//!
//! A denied authorization decision is never represented here; it is a
//! successful call that returns `allowed: false`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortcullisError {
    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("Entity not found: {entity} {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity} {id}")]
    AlreadyExists { entity: String, id: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

impl PortcullisError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn already_exists(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }
}

pub type PortcullisResult<T> = Result<T, PortcullisError>;
