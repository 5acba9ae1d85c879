//! HTTP client for the external relationship graph.
//!
//! Every call is a JSON `POST` under `{base_url}/v1/relationships/`.
//! Nothing is cached locally.

use std::time::Duration;

use portcullis_core::error::PortcullisResult;
use portcullis_core::relationship::{RelationshipClient, RelationshipFilter, RelationshipTuple};
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::RelationshipConfig;
use crate::error::AuthzError;

#[derive(Debug, Deserialize)]
struct CheckReply {
    allowed: bool,
}

#[derive(Debug, Deserialize)]
struct ReadReply {
    #[serde(default)]
    relationships: Vec<RelationshipTuple>,
}

#[derive(Debug, Clone)]
pub struct HttpRelationshipClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRelationshipClient {
    pub fn new(config: &RelationshipConfig) -> Result<Self, AuthzError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
        })
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, AuthzError> {
        let url = format!("{}/v1/relationships/{path}", self.base_url);
        let response = self.http.post(url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthzError::RelationshipStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, AuthzError> {
        Ok(self.post(path, body).await?.json::<T>().await?)
    }
}

impl RelationshipClient for HttpRelationshipClient {
    async fn write(&self, tuple: &RelationshipTuple) -> PortcullisResult<()> {
        self.post("write", tuple).await?;
        Ok(())
    }

    async fn read(&self, filter: &RelationshipFilter) -> PortcullisResult<Vec<RelationshipTuple>> {
        let reply: ReadReply = self.post_json("read", filter).await?;
        Ok(reply.relationships)
    }

    async fn check(&self, tuple: &RelationshipTuple) -> PortcullisResult<bool> {
        let reply: CheckReply = self.post_json("check", tuple).await?;
        Ok(reply.allowed)
    }
}
