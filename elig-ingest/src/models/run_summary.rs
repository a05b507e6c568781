//! Run-level results
//!
//! Per-vendor ingestion outcomes, normalization counters, data-quality matrices
//! and the validation report are aggregated into one [`RunSummary`], which is
//! persisted with the run ledger and printed by the binary.

use serde::Serialize;

use super::load_run::RunState;

/// Result of ingesting one vendor
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VendorOutcome {
    Ingested { rows: u64 },
    Failed { reason: String },
}

impl VendorOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, VendorOutcome::Failed { .. })
    }
}

/// One vendor's outcome together with the file it came from
#[derive(Debug, Clone, Serialize)]
pub struct VendorReport {
    pub vendor: String,
    pub file: String,
    #[serde(flatten)]
    pub outcome: VendorOutcome,
}

/// Normalization counters for one vendor
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VendorQuality {
    pub vendor: String,
    pub rows: u64,
    /// Rows whose `dob_norm` is null
    pub null_dob: u64,
    /// Rows whose `relationship_norm` is `OTHER`
    pub other_relationship: u64,
}

/// Totals produced by the normalization stage
#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizationSummary {
    pub run_id: String,
    pub rows: u64,
    pub null_dob: u64,
    pub other_relationship: u64,
    /// Sorted by vendor name
    pub vendors: Vec<VendorQuality>,
}

/// Missing-field counts in `raw_staging` for one vendor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawCompleteness {
    pub vendor: String,
    pub total: i64,
    pub missing_names: i64,
    pub missing_dob: i64,
    pub missing_address: i64,
}

/// `(raw code → label, count)` entry of the relationship matrix
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationshipCount {
    pub vendor: String,
    pub relationship_raw: Option<String>,
    pub relationship_norm: String,
    pub count: i64,
}

/// A raw date value that normalized to null
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateFailure {
    pub vendor: String,
    pub dob_raw: Option<String>,
    pub count: i64,
}

/// Data-quality matrices for one run, read back from the warehouse
#[derive(Debug, Clone, Default, Serialize)]
pub struct QualitySummary {
    pub raw_completeness: Vec<RawCompleteness>,
    pub relationships: Vec<RelationshipCount>,
    pub failed_dates: Vec<DateFailure>,
}

/// Everything known about a run when it stops
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub state: RunState,
    pub vendors: Vec<VendorReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalization: Option<NormalizationSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualitySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<super::ValidationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunSummary {
    pub fn new(run_id: impl Into<String>, state: RunState) -> Self {
        Self {
            run_id: run_id.into(),
            state,
            vendors: Vec::new(),
            normalization: None,
            quality: None,
            validation: None,
            manifest_path: None,
            error: None,
        }
    }

    /// Total raw rows written across successful vendors
    pub fn ingested_rows(&self) -> u64 {
        self.vendors
            .iter()
            .map(|v| match v.outcome {
                VendorOutcome::Ingested { rows } => rows,
                VendorOutcome::Failed { .. } => 0,
            })
            .sum()
    }

    pub fn failed_vendors(&self) -> Vec<&VendorReport> {
        self.vendors.iter().filter(|v| v.outcome.is_failed()).collect()
    }
}
