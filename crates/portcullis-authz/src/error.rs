//! Authorization error types.

use portcullis_core::error::PortcullisError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("invalid API key")]
    InvalidApiKey,

    #[error("policy evaluation failed: {0}")]
    PolicyEvaluation(String),

    #[error("policy evaluation task aborted: {0}")]
    PolicyTask(String),

    #[error("relationship service unreachable: {0}")]
    RelationshipTransport(String),

    #[error("relationship service returned {status}: {body}")]
    RelationshipStatus { status: u16, body: String },

    #[error("relationship service is not configured")]
    RelationshipUnconfigured,

    #[error("cannot serialize attributes: {0}")]
    Attributes(String),
}

impl From<AuthzError> for PortcullisError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::InvalidApiKey => PortcullisError::Unauthorized {
                reason: err.to_string(),
            },
            other => PortcullisError::Infrastructure(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for AuthzError {
    fn from(err: reqwest::Error) -> Self {
        AuthzError::RelationshipTransport(err.to_string())
    }
}
