//! Table schema definitions for the eligibility warehouse
//!
//! Each struct implements [`TableSchema`] and is the single source of truth for
//! its table's columns. Stage 0 creates the tables from these definitions and
//! then runs column auto-sync against them.

use crate::db::schema_sync::{ColumnDefinition, SchemaSync, TableSchema};
use crate::Result;
use sqlx::SqlitePool;
use tracing::info;

pub const RAW_STAGING: &str = "raw_staging";
pub const RAW_STAGING_PAYLOAD: &str = "raw_staging_payload";
pub const SILVER_MEMBERS: &str = "silver_members";
pub const LOAD_RUNS: &str = "load_runs";

/// Tables that must exist before ingestion may start
pub const REQUIRED_TABLES: &[&str] = &[RAW_STAGING, RAW_STAGING_PAYLOAD, SILVER_MEMBERS, LOAD_RUNS];

/// Identity tuple shared by raw, payload and silver rows
pub const IDENTITY_COLUMNS: &[&str] = &["load_run_id", "source_vendor", "source_file", "source_row"];

/// Columns excluded from the content hash
pub const LINEAGE_COLUMNS: &[&str] = &[
    "source_vendor",
    "source_file",
    "source_row",
    "load_run_id",
    "ingested_at",
    "record_hash_raw",
];

fn identity_columns() -> Vec<ColumnDefinition> {
    vec![
        ColumnDefinition::new("load_run_id", "TEXT").not_null(),
        ColumnDefinition::new("source_vendor", "TEXT").not_null(),
        ColumnDefinition::new("source_file", "TEXT").not_null(),
        ColumnDefinition::new("source_row", "INTEGER").not_null(),
    ]
}

/// `raw_staging`: one canonicalized row per source record
pub struct RawStagingSchema;

impl TableSchema for RawStagingSchema {
    fn table_name() -> &'static str {
        RAW_STAGING
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        let mut columns = identity_columns();
        columns.push(ColumnDefinition::new("ingested_at", "TEXT").not_null());
        for content in [
            "member_id",
            "first_name_raw",
            "last_name_raw",
            "dob_raw",
            "gender_raw",
            "relationship_raw",
            "address_line1",
            "address_line2",
            "city",
            "state",
            "zip",
            "plan_type",
            "provider",
            "extra_payload",
        ] {
            columns.push(ColumnDefinition::new(content, "TEXT"));
        }
        columns.push(ColumnDefinition::new("record_hash_raw", "TEXT").not_null());
        columns
    }

    fn primary_key() -> &'static [&'static str] {
        IDENTITY_COLUMNS
    }
}

/// `raw_staging_payload`: verbatim JSON sidecar of each source record
pub struct RawStagingPayloadSchema;

impl TableSchema for RawStagingPayloadSchema {
    fn table_name() -> &'static str {
        RAW_STAGING_PAYLOAD
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        let mut columns = identity_columns();
        columns.extend([
            ColumnDefinition::new("ingested_at", "TEXT").not_null(),
            ColumnDefinition::new("record_hash_raw", "TEXT").not_null(),
            ColumnDefinition::new("raw_payload_json", "TEXT").not_null(),
        ]);
        columns
    }

    fn primary_key() -> &'static [&'static str] {
        IDENTITY_COLUMNS
    }
}

/// `silver_members`: normalized member rows
pub struct SilverMembersSchema;

impl TableSchema for SilverMembersSchema {
    fn table_name() -> &'static str {
        SILVER_MEMBERS
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        let mut columns = identity_columns();
        columns.push(ColumnDefinition::new("record_hash_raw", "TEXT").not_null());
        for name in [
            "first_name_norm",
            "last_name_norm",
            "dob_norm",
            "relationship_norm",
            "plan_type",
            "provider",
            "first_name_raw",
            "last_name_raw",
            "dob_raw",
            "relationship_raw",
        ] {
            columns.push(ColumnDefinition::new(name, "TEXT"));
        }
        columns.extend([
            ColumnDefinition::new("ingested_at", "TEXT").not_null(),
            ColumnDefinition::new("cleaned_at", "TEXT").not_null(),
        ]);
        columns
    }

    fn primary_key() -> &'static [&'static str] {
        IDENTITY_COLUMNS
    }
}

/// `load_runs`: one ledger row per pipeline run
pub struct LoadRunsSchema;

impl TableSchema for LoadRunsSchema {
    fn table_name() -> &'static str {
        LOAD_RUNS
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("load_run_id", "TEXT").not_null(),
            ColumnDefinition::new("state", "TEXT").not_null(),
            ColumnDefinition::new("started_at", "TEXT").not_null(),
            ColumnDefinition::new("ended_at", "TEXT"),
            ColumnDefinition::new("error", "TEXT"),
            ColumnDefinition::new("summary_json", "TEXT"),
            ColumnDefinition::new("updated_at", "TEXT")
                .not_null()
                .default("CURRENT_TIMESTAMP"),
        ]
    }

    fn primary_key() -> &'static [&'static str] {
        &["load_run_id"]
    }
}

/// Create every warehouse table that does not exist yet
pub async fn create_all_tables(pool: &SqlitePool) -> Result<()> {
    SchemaSync::create_table::<RawStagingSchema>(pool).await?;
    SchemaSync::create_table::<RawStagingPayloadSchema>(pool).await?;
    SchemaSync::create_table::<SilverMembersSchema>(pool).await?;
    SchemaSync::create_table::<LoadRunsSchema>(pool).await?;
    Ok(())
}

/// Add columns present in code but missing from existing tables
pub async fn sync_all_table_schemas(pool: &SqlitePool) -> Result<()> {
    info!("Starting automatic schema synchronization");

    SchemaSync::sync_table::<RawStagingSchema>(pool).await?;
    SchemaSync::sync_table::<RawStagingPayloadSchema>(pool).await?;
    SchemaSync::sync_table::<SilverMembersSchema>(pool).await?;
    SchemaSync::sync_table::<LoadRunsSchema>(pool).await?;

    info!("Schema synchronization complete");
    Ok(())
}
