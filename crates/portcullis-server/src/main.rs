//! Portcullis server entry point.

use anyhow::Context;
use portcullis_authz::{DecisionEngine, HttpRelationshipClient, RegoEvaluator, TenantStore};
use portcullis_db::{DbManager, run_migrations};
use portcullis_server::app::{AppState, build_router};
use portcullis_server::config::ServerConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("portcullis=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).json().init();

    tracing::info!("Starting Portcullis server...");
    let config = ServerConfig::load().context("loading configuration")?;

    let manager = DbManager::connect(&config.db)
        .await
        .context("connecting to SurrealDB")?;
    run_migrations(manager.client())
        .await
        .context("running migrations")?;

    let repo = manager.organizations();
    let store = TenantStore::new(repo.clone());
    let mut engine = DecisionEngine::new(repo, RegoEvaluator::new(&config.authz));
    if let Some(relationship) = &config.relationship {
        let client = HttpRelationshipClient::new(relationship)
            .context("building relationship client")?;
        tracing::info!(base_url = %relationship.base_url, "Relationship graph enabled");
        engine = engine.with_relationships(client);
    }

    let mut state = AppState::new(engine, store);
    match config.admin_token {
        Some(token) if !token.is_empty() => state = state.with_admin_token(token),
        _ => tracing::info!("No admin token configured, administration routes disabled"),
    }

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "Portcullis listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!("Portcullis server stopped.");
    Ok(())
}
