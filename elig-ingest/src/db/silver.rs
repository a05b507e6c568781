//! `silver_members` persistence

use elig_common::Result;
use sqlx::SqlitePool;
use tracing::info;

use crate::models::SilverMember;

/// Replace a run's silver rows with `members`, in one transaction
///
/// Returns the number of rows removed before the insert (non-zero only when a
/// run is normalized again).
pub async fn replace_run_members(
    pool: &SqlitePool,
    run_id: &str,
    members: &[SilverMember],
) -> Result<u64> {
    let mut tx = pool.begin().await?;

    let removed = sqlx::query("DELETE FROM silver_members WHERE load_run_id = ?")
        .bind(run_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if removed > 0 {
        info!(run_id, removed, "Replacing existing silver rows for run");
    }

    for m in members {
        sqlx::query(
            r#"
            INSERT INTO silver_members (
                load_run_id, source_vendor, source_file, source_row, record_hash_raw,
                first_name_norm, last_name_norm, dob_norm, relationship_norm,
                plan_type, provider, first_name_raw, last_name_raw, dob_raw,
                relationship_raw, ingested_at, cleaned_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&m.load_run_id)
        .bind(&m.source_vendor)
        .bind(&m.source_file)
        .bind(m.source_row)
        .bind(&m.record_hash_raw)
        .bind(&m.first_name_norm)
        .bind(&m.last_name_norm)
        .bind(&m.dob_norm)
        .bind(&m.relationship_norm)
        .bind(&m.plan_type)
        .bind(&m.provider)
        .bind(&m.first_name_raw)
        .bind(&m.last_name_raw)
        .bind(&m.dob_raw)
        .bind(&m.relationship_raw)
        .bind(&m.ingested_at)
        .bind(&m.cleaned_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(removed)
}
