//! `raw_staging` and `raw_staging_payload` persistence
//!
//! Raw rows are written with the column list read from the live table, so a
//! column added by schema sync is picked up without code changes.

use elig_common::db::table_schemas::{RAW_STAGING, RAW_STAGING_PAYLOAD};
use elig_common::Result;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::models::{CanonicalRow, FieldValue, PayloadRecord, StagedMember};

/// `INSERT INTO raw_staging (...) VALUES (?, ...)` for the given column order
pub fn raw_insert_sql(columns: &[String]) -> String {
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        RAW_STAGING,
        columns.join(", "),
        placeholders
    )
}

fn bind_field<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: Option<&FieldValue>,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Some(FieldValue::Number(n)) if n.is_i64() => query.bind(n.as_i64()),
        Some(v) => query.bind(v.to_column_text()),
        None => query.bind(None::<String>),
    }
}

/// Write one dual-write batch: raw rows then payload rows, one transaction
///
/// `raw_sql` must come from [`raw_insert_sql`] over `columns`.
pub async fn write_batch(
    pool: &SqlitePool,
    raw_sql: &str,
    columns: &[String],
    raw_rows: &[CanonicalRow],
    payloads: &[PayloadRecord],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    for row in raw_rows {
        let mut query = sqlx::query(raw_sql);
        for column in columns {
            query = bind_field(query, row.get(column));
        }
        query.execute(&mut *tx).await?;
    }

    for payload in payloads {
        sqlx::query(
            r#"
            INSERT INTO raw_staging_payload (
                load_run_id, source_vendor, source_file, source_row,
                ingested_at, record_hash_raw, raw_payload_json
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&payload.load_run_id)
        .bind(&payload.source_vendor)
        .bind(&payload.source_file)
        .bind(payload.source_row)
        .bind(&payload.ingested_at)
        .bind(&payload.record_hash_raw)
        .bind(&payload.raw_payload_json)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    debug!(
        raw = raw_rows.len(),
        payload = payloads.len(),
        "Committed dual-write batch"
    );
    Ok(())
}

/// Raw rows of one run, ordered by vendor, file and row
pub async fn load_staged_members(pool: &SqlitePool, run_id: &str) -> Result<Vec<StagedMember>> {
    let rows = sqlx::query(
        r#"
        SELECT load_run_id, source_vendor, source_file, source_row, record_hash_raw,
               first_name_raw, last_name_raw, dob_raw, relationship_raw,
               plan_type, provider, ingested_at
        FROM raw_staging
        WHERE load_run_id = ?
        ORDER BY source_vendor, source_file, source_row
        "#,
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| StagedMember {
            load_run_id: row.get("load_run_id"),
            source_vendor: row.get("source_vendor"),
            source_file: row.get("source_file"),
            source_row: row.get("source_row"),
            record_hash_raw: row.get("record_hash_raw"),
            first_name_raw: row.get("first_name_raw"),
            last_name_raw: row.get("last_name_raw"),
            dob_raw: row.get("dob_raw"),
            relationship_raw: row.get("relationship_raw"),
            plan_type: row.get("plan_type"),
            provider: row.get("provider"),
            ingested_at: row.get("ingested_at"),
        })
        .collect())
}

/// Rows in `table` for one run
pub async fn count_for_run(pool: &SqlitePool, table: &str, run_id: &str) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE load_run_id = ?", table);
    let count: i64 = sqlx::query_scalar(&sql).bind(run_id).fetch_one(pool).await?;
    Ok(count)
}

/// Payload JSON for one identity tuple
pub async fn load_payload_json(
    pool: &SqlitePool,
    run_id: &str,
    vendor: &str,
    source_file: &str,
    source_row: i64,
) -> Result<Option<String>> {
    let sql = format!(
        "SELECT raw_payload_json FROM {} \
         WHERE load_run_id = ? AND source_vendor = ? AND source_file = ? AND source_row = ?",
        RAW_STAGING_PAYLOAD
    );
    let json: Option<String> = sqlx::query_scalar(&sql)
        .bind(run_id)
        .bind(vendor)
        .bind(source_file)
        .bind(source_row)
        .fetch_optional(pool)
        .await?;
    Ok(json)
}
