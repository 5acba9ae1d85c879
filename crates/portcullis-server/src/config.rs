//! Server configuration.
//!
//! Every section falls back to its defaults, then an optional YAML file
//! named by `PORTCULLIS_CONFIG` is merged, then `PORTCULLIS_*`
//! environment variables (`__` separates nested keys, e.g.
//! `PORTCULLIS_DB__URL`).

use std::net::SocketAddr;

use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use portcullis_authz::{AuthzConfig, RelationshipConfig};
use portcullis_db::DbConfig;
use serde::Deserialize;

pub const CONFIG_PATH_VAR: &str = "PORTCULLIS_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub db: DbConfig,
    pub authz: AuthzConfig,
    /// Relationship graph endpoint; the ReBAC entry points are disabled
    /// when absent.
    pub relationship: Option<RelationshipConfig>,
    /// Token for the `/admin/v1` routes; they answer 404 when absent.
    pub admin_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            db: DbConfig::default(),
            authz: AuthzConfig::default(),
            relationship: None,
            admin_token: None,
        }
    }
}

impl ServerConfig {
    /// Load from the YAML file (if configured) and the environment.
    pub fn load() -> Result<Self, figment::Error> {
        let mut figment = Figment::new();
        if let Ok(path) = std::env::var(CONFIG_PATH_VAR) {
            figment = figment.merge(Yaml::file(path));
        }
        let env = Env::prefixed("PORTCULLIS_").ignore(&["config"]).split("__");
        Self::from_figment(figment.merge(env))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, figment::Error> {
        figment.extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sources_give_defaults() {
        let config = ServerConfig::from_figment(Figment::new()).unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.db.namespace, "portcullis");
        assert_eq!(config.authz.policy_query, "data.portcullis.allow");
        assert!(config.relationship.is_none());
        assert!(config.admin_token.is_none());
    }

    #[test]
    fn yaml_overrides_nested_sections() {
        let yaml = "\
bind_addr: 127.0.0.1:9000
db:
  url: surreal.internal:8000
  write_retries: 3
relationship:
  base_url: http://graph.internal:8081
admin_token: s3cret
";
        let config = ServerConfig::from_figment(Figment::from(Yaml::string(yaml))).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse::<std::net::SocketAddr>().unwrap());
        assert_eq!(config.db.url, "surreal.internal:8000");
        assert_eq!(config.db.write_retries, 3);
        assert_eq!(config.db.database, "main");

        let relationship = config.relationship.unwrap();
        assert_eq!(relationship.base_url, "http://graph.internal:8081");
        assert_eq!(relationship.timeout_secs, 5);
        assert_eq!(config.admin_token.as_deref(), Some("s3cret"));
    }
}
