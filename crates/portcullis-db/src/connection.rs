//! Connection to the SurrealDB instance holding the tenant documents.
//!
//! One connection serves every tenant; each tenant is a single
//! `organization` record, so the connection settings double as the
//! tenant store settings (see [`DbConfig::write_retries`]).

use serde::Deserialize;
use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::repository::{DEFAULT_WRITE_RETRIES, SurrealOrganizationRepository};

/// Where the tenant store lives and how hard it fights for a write.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Host and port of the SurrealDB WebSocket endpoint, without scheme.
    pub url: String,
    pub namespace: String,
    pub database: String,
    /// Root credentials; migrations define tables and indexes.
    pub username: String,
    pub password: String,
    /// Attempts per tenant write before giving up with a conflict. A
    /// write is retried when another writer bumped the tenant revision
    /// first or SurrealDB aborted the transaction as conflicting.
    pub write_retries: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "portcullis".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
            write_retries: DEFAULT_WRITE_RETRIES,
        }
    }
}

/// An authenticated connection scoped to the tenant namespace and
/// database.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
    write_retries: u32,
}

impl DbManager {
    /// Sign in as root and select the configured namespace and database.
    /// Migrations are not run here; see [`crate::run_migrations`].
    pub async fn connect(config: &DbConfig) -> Result<Self, surrealdb::Error> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            write_retries = config.write_retries,
            "Connecting to tenant store"
        );

        let db = Surreal::new::<Ws>(&config.url).await?;
        db.signin(Root {
            username: config.username.clone(),
            password: config.password.clone(),
        })
        .await?;
        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        info!("Tenant store connected");
        Ok(Self {
            db,
            write_retries: config.write_retries,
        })
    }

    pub fn client(&self) -> &Surreal<Client> {
        &self.db
    }

    /// Tenant repository over this connection, carrying the configured
    /// write retry bound.
    pub fn organizations(&self) -> SurrealOrganizationRepository<Client> {
        SurrealOrganizationRepository::new(self.db.clone()).with_write_retries(self.write_retries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: DbConfig =
            serde_json::from_str(r#"{"url": "db.internal:8000", "write_retries": 2}"#).unwrap();
        assert_eq!(config.url, "db.internal:8000");
        assert_eq!(config.namespace, "portcullis");
        assert_eq!(config.write_retries, 2);
    }

    #[test]
    fn default_retry_bound_matches_repository() {
        assert_eq!(DbConfig::default().write_retries, DEFAULT_WRITE_RETRIES);
    }
}
