//! Post-hoc integrity audit of one run
//!
//! Checks dual-write parity, join completeness, hash agreement and silver
//! coverage. Discrepancies are reported, never repaired.

use elig_common::LoadRunId;
use sqlx::SqlitePool;
use tracing::{error, info};

use crate::db::audit;
use crate::error::{IngestError, IngestResult};
use crate::models::ValidationReport;

/// Gather the counts for `run_id` without judging them
pub async fn audit_run(pool: &SqlitePool, run_id: &LoadRunId) -> IngestResult<ValidationReport> {
    let report = audit::validation_report(pool, run_id.as_str()).await?;
    info!(
        run_id = %run_id,
        raw = report.raw_count,
        payload = report.payload_count,
        silver = report.silver_count,
        joined = report.joined,
        hash_matches = report.hash_matches,
        "Validation counts"
    );
    Ok(report)
}

/// Audit `run_id` and fail with `IntegrityViolation` if any invariant is broken
pub async fn validate_run(pool: &SqlitePool, run_id: &LoadRunId) -> IngestResult<ValidationReport> {
    let report = audit_run(pool, run_id).await?;
    check(report)
}

/// Turn a report with violations into an error
pub fn check(report: ValidationReport) -> IngestResult<ValidationReport> {
    let violations = report.violations();
    if violations.is_empty() {
        info!(run_id = %report.run_id, "Validation passed");
        return Ok(report);
    }

    for v in &violations {
        error!(run_id = %report.run_id, violation = %v, "Validation failed");
    }
    Err(IngestError::IntegrityViolation {
        run_id: report.run_id,
        violations,
    })
}
