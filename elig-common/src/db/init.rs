//! Warehouse connection and provisioning
//!
//! Provisioning runs in three phases:
//! 1. CREATE TABLE IF NOT EXISTS for every declared table
//! 2. Column auto-sync against the declared schemas
//! 3. Verification that every required table exists
//!
//! Every phase is idempotent; provisioning an already current warehouse is a no-op.

use crate::db::schema_sync::SchemaIntrospector;
use crate::db::table_schemas::{self, REQUIRED_TABLES};
use crate::{Error, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{debug, info};

/// Open (creating if needed) the warehouse file at `db_path`
///
/// The pool holds a single connection: stages run strictly in sequence and
/// every statement of a run goes through the same connection.
pub async fn open_warehouse(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new warehouse: {}", db_path.display());
    } else {
        info!("Opened existing warehouse: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    Ok(pool)
}

/// In-memory warehouse, used by tests and dry runs
///
/// The single connection must never be recycled or the database vanishes.
pub async fn open_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    Ok(pool)
}

/// Create, sync and verify every warehouse table
pub async fn provision_warehouse(pool: &SqlitePool) -> Result<()> {
    table_schemas::create_all_tables(pool).await?;
    table_schemas::sync_all_table_schemas(pool).await?;
    verify_required_tables(pool).await?;
    info!("Warehouse schema ready ({} tables)", REQUIRED_TABLES.len());
    Ok(())
}

/// Fail with [`Error::SchemaIntegrity`] naming every missing required table
pub async fn verify_required_tables(pool: &SqlitePool) -> Result<()> {
    let mut missing = Vec::new();
    for table in REQUIRED_TABLES {
        if SchemaIntrospector::table_exists(pool, table).await? {
            debug!(table, "Required table present");
        } else {
            missing.push(*table);
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::SchemaIntegrity(format!(
            "required tables missing: {}",
            missing.join(", ")
        )))
    }
}
