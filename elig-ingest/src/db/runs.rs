//! `load_runs` ledger persistence
//!
//! The run controller upserts the ledger row at every state transition, so a
//! run that crashed mid-way is left visible in its last non-terminal state.

use chrono::{DateTime, Utc};
use elig_common::{Error, LoadRunId, Result};
use sqlx::{Row, SqlitePool};

use crate::models::{LoadRun, RunState, RunSummary};

/// Insert or update the ledger row for `run`
pub async fn save_run(pool: &SqlitePool, run: &LoadRun, summary: Option<&RunSummary>) -> Result<()> {
    let summary_json = summary
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to serialize run summary: {}", e)))?;
    let started_at = run.started_at.to_rfc3339();
    let ended_at = run.ended_at.map(|dt| dt.to_rfc3339());

    sqlx::query(
        r#"
        INSERT INTO load_runs (
            load_run_id, state, started_at, ended_at, error, summary_json, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(load_run_id) DO UPDATE SET
            state = excluded.state,
            ended_at = excluded.ended_at,
            error = excluded.error,
            summary_json = COALESCE(excluded.summary_json, load_runs.summary_json),
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(run.run_id.as_str())
    .bind(run.state.as_str())
    .bind(&started_at)
    .bind(&ended_at)
    .bind(&run.error)
    .bind(&summary_json)
    .execute(pool)
    .await?;

    Ok(())
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", field, e)))
}

/// Load a run from the ledger
pub async fn load_run(pool: &SqlitePool, run_id: &LoadRunId) -> Result<Option<LoadRun>> {
    let row = sqlx::query(
        r#"
        SELECT load_run_id, state, started_at, ended_at, error
        FROM load_runs
        WHERE load_run_id = ?
        "#,
    )
    .bind(run_id.as_str())
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let state: String = row.get("state");
    let state: RunState = state
        .parse()
        .map_err(|e: crate::error::IngestError| Error::Internal(e.to_string()))?;

    let started_at: String = row.get("started_at");
    let ended_at: Option<String> = row.get("ended_at");

    Ok(Some(LoadRun {
        run_id: run_id.clone(),
        state,
        started_at: parse_timestamp("started_at", &started_at)?,
        ended_at: ended_at
            .map(|s| parse_timestamp("ended_at", &s))
            .transpose()?,
        error: row.get("error"),
    }))
}

/// Stored summary JSON for a run, if any
pub async fn load_summary_json(pool: &SqlitePool, run_id: &LoadRunId) -> Result<Option<String>> {
    let json: Option<Option<String>> =
        sqlx::query_scalar("SELECT summary_json FROM load_runs WHERE load_run_id = ?")
            .bind(run_id.as_str())
            .fetch_optional(pool)
            .await?;
    Ok(json.flatten())
}
