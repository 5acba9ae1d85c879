//! Outbound port to an external relationship graph.

use serde::{Deserialize, Serialize};

use crate::error::PortcullisResult;

/// `subject` has `relation` to `object`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipTuple {
    pub subject: String,
    pub relation: String,
    pub object: String,
}

impl RelationshipTuple {
    pub fn new(
        subject: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            relation: relation.into(),
            object: object.into(),
        }
    }
}

/// Read filter; `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
}

pub trait RelationshipClient: Send + Sync {
    fn write(
        &self,
        tuple: &RelationshipTuple,
    ) -> impl Future<Output = PortcullisResult<()>> + Send;
    fn read(
        &self,
        filter: &RelationshipFilter,
    ) -> impl Future<Output = PortcullisResult<Vec<RelationshipTuple>>> + Send;
    fn check(
        &self,
        tuple: &RelationshipTuple,
    ) -> impl Future<Output = PortcullisResult<bool>> + Send;
}
