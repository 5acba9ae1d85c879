//! Schema definitions and migration runner for SurrealDB.
//!
//! Each tenant is one `organization` record. The header fields are
//! typed; the embedded collections (users, roles, groups, resources,
//! policies, api_keys) are free-form arrays, so the table is SCHEMALESS.
//! Ids are stored as 24-char hex strings.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "tenant_aggregate",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "pending_repair",
        sql: SCHEMA_V2,
    },
];

const SCHEMA_V1: &str = "\
DEFINE TABLE organization SCHEMALESS;
DEFINE FIELD identifier ON TABLE organization TYPE string;
DEFINE FIELD display_name ON TABLE organization TYPE string;
DEFINE FIELD users ON TABLE organization TYPE array DEFAULT [];
DEFINE FIELD roles ON TABLE organization TYPE array DEFAULT [];
DEFINE FIELD groups ON TABLE organization TYPE array DEFAULT [];
DEFINE FIELD resources ON TABLE organization TYPE array DEFAULT [];
DEFINE FIELD policies ON TABLE organization TYPE array DEFAULT [];
DEFINE FIELD api_keys ON TABLE organization TYPE array DEFAULT [];
DEFINE FIELD revision ON TABLE organization TYPE int DEFAULT 0;
DEFINE FIELD created_at ON TABLE organization TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE organization TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_organization_identifier ON TABLE organization \
    COLUMNS identifier UNIQUE;
";

const SCHEMA_V2: &str = "\
DEFINE TABLE pending_repair SCHEMALESS;
DEFINE FIELD organization_id ON TABLE pending_repair TYPE string;
DEFINE FIELD mutations ON TABLE pending_repair TYPE array;
DEFINE FIELD reason ON TABLE pending_repair TYPE string;
DEFINE FIELD created_at ON TABLE pending_repair TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_pending_repair_org ON TABLE pending_repair \
    COLUMNS organization_id;
";

/// Bring the database up to the latest schema version.
///
/// Safe to call on every start: applied versions are recorded in
/// `_migration` and skipped.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;
    }

    info!(version = latest_version(), "Schema is up to date");
    Ok(())
}

fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
