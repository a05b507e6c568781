//! Audit queries over one run: dual-write integrity and data quality
//!
//! Raw and payload rows are joined on the identity tuple
//! `(load_run_id, source_vendor, source_file, source_row)`.

use elig_common::Result;
use sqlx::{Row, SqlitePool};

use crate::models::{
    DateFailure, QualitySummary, RawCompleteness, RelationshipCount, ValidationReport,
    VendorCounts,
};

const IDENTITY_JOIN: &str = "s.load_run_id = p.load_run_id \
     AND s.source_vendor = p.source_vendor \
     AND s.source_file = p.source_file \
     AND s.source_row = p.source_row";

async fn scalar(pool: &SqlitePool, sql: &str, run_id: &str) -> Result<i64> {
    let n: i64 = sqlx::query_scalar(sql).bind(run_id).fetch_one(pool).await?;
    Ok(n)
}

fn count_for(counts: &[(String, i64)], vendor: &str) -> i64 {
    counts
        .iter()
        .find(|(v, _)| v == vendor)
        .map(|(_, n)| *n)
        .unwrap_or(0)
}

async fn vendor_counts(pool: &SqlitePool, table: &str, run_id: &str) -> Result<Vec<(String, i64)>> {
    let sql = format!(
        "SELECT source_vendor, COUNT(*) AS n FROM {} WHERE load_run_id = ? GROUP BY source_vendor ORDER BY source_vendor",
        table
    );
    let rows = sqlx::query(&sql).bind(run_id).fetch_all(pool).await?;
    Ok(rows
        .iter()
        .map(|r| (r.get::<String, _>("source_vendor"), r.get::<i64, _>("n")))
        .collect())
}

/// Gather every count the validation stage checks
pub async fn validation_report(pool: &SqlitePool, run_id: &str) -> Result<ValidationReport> {
    let raw_count = scalar(pool, "SELECT COUNT(*) FROM raw_staging WHERE load_run_id = ?", run_id).await?;
    let payload_count = scalar(
        pool,
        "SELECT COUNT(*) FROM raw_staging_payload WHERE load_run_id = ?",
        run_id,
    )
    .await?;
    let silver_count = scalar(
        pool,
        "SELECT COUNT(*) FROM silver_members WHERE load_run_id = ?",
        run_id,
    )
    .await?;

    let joined = scalar(
        pool,
        &format!(
            "SELECT COUNT(*) FROM raw_staging s JOIN raw_staging_payload p ON {} WHERE s.load_run_id = ?",
            IDENTITY_JOIN
        ),
        run_id,
    )
    .await?;

    let raw_without_payload = scalar(
        pool,
        &format!(
            "SELECT COUNT(*) FROM raw_staging s LEFT JOIN raw_staging_payload p ON {} \
             WHERE s.load_run_id = ? AND p.load_run_id IS NULL",
            IDENTITY_JOIN
        ),
        run_id,
    )
    .await?;

    let payload_without_raw = scalar(
        pool,
        &format!(
            "SELECT COUNT(*) FROM raw_staging_payload p LEFT JOIN raw_staging s ON {} \
             WHERE p.load_run_id = ? AND s.load_run_id IS NULL",
            IDENTITY_JOIN
        ),
        run_id,
    )
    .await?;

    let hash_matches = scalar(
        pool,
        &format!(
            "SELECT COUNT(*) FROM raw_staging s JOIN raw_staging_payload p ON {} \
             WHERE s.load_run_id = ? AND s.record_hash_raw = p.record_hash_raw",
            IDENTITY_JOIN
        ),
        run_id,
    )
    .await?;

    let raw_by_vendor = vendor_counts(pool, "raw_staging", run_id).await?;
    let payload_by_vendor = vendor_counts(pool, "raw_staging_payload", run_id).await?;

    let mut vendors: Vec<&String> = raw_by_vendor
        .iter()
        .chain(payload_by_vendor.iter())
        .map(|(v, _)| v)
        .collect();
    vendors.sort();
    vendors.dedup();

    let per_vendor = vendors
        .into_iter()
        .map(|vendor| VendorCounts {
            vendor: vendor.clone(),
            raw: count_for(&raw_by_vendor, vendor),
            payload: count_for(&payload_by_vendor, vendor),
        })
        .collect();

    Ok(ValidationReport {
        run_id: run_id.to_string(),
        raw_count,
        payload_count,
        silver_count,
        joined,
        raw_without_payload,
        payload_without_raw,
        hash_matches,
        per_vendor,
    })
}

/// Missing-field counts, relationship matrix and failed dates for one run
pub async fn quality_summary(pool: &SqlitePool, run_id: &str) -> Result<QualitySummary> {
    let completeness: Vec<RawCompleteness> = sqlx::query(
        r#"
        SELECT source_vendor,
               COUNT(*) AS total,
               SUM(CASE WHEN first_name_raw IS NULL OR first_name_raw = '' THEN 1 ELSE 0 END) AS missing_names,
               SUM(CASE WHEN dob_raw IS NULL OR dob_raw = '' THEN 1 ELSE 0 END) AS missing_dob,
               SUM(CASE WHEN address_line1 IS NULL OR address_line1 = '' THEN 1 ELSE 0 END) AS missing_address
        FROM raw_staging
        WHERE load_run_id = ?
        GROUP BY source_vendor
        ORDER BY source_vendor
        "#,
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?
    .iter()
    .map(|r| RawCompleteness {
        vendor: r.get("source_vendor"),
        total: r.get("total"),
        missing_names: r.get("missing_names"),
        missing_dob: r.get("missing_dob"),
        missing_address: r.get("missing_address"),
    })
    .collect();

    let relationships: Vec<RelationshipCount> = sqlx::query(
        r#"
        SELECT source_vendor, relationship_raw, relationship_norm, COUNT(*) AS n
        FROM silver_members
        WHERE load_run_id = ?
        GROUP BY source_vendor, relationship_raw, relationship_norm
        ORDER BY source_vendor, n DESC, relationship_raw
        "#,
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?
    .iter()
    .map(|r| RelationshipCount {
        vendor: r.get("source_vendor"),
        relationship_raw: r.get("relationship_raw"),
        relationship_norm: r.get("relationship_norm"),
        count: r.get("n"),
    })
    .collect();

    let failed_dates: Vec<DateFailure> = sqlx::query(
        r#"
        SELECT source_vendor, dob_raw, COUNT(*) AS n
        FROM silver_members
        WHERE load_run_id = ? AND dob_norm IS NULL
        GROUP BY source_vendor, dob_raw
        ORDER BY source_vendor, n DESC, dob_raw
        "#,
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?
    .iter()
    .map(|r| DateFailure {
        vendor: r.get("source_vendor"),
        dob_raw: r.get("dob_raw"),
        count: r.get("n"),
    })
    .collect();

    Ok(QualitySummary {
        raw_completeness: completeness,
        relationships,
        failed_dates,
    })
}
