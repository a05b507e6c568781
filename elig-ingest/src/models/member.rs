//! Warehouse row shapes written and read by the pipeline stages

use serde::Serialize;

/// Payload sidecar row: the verbatim source record for one raw row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayloadRecord {
    pub load_run_id: String,
    pub source_vendor: String,
    pub source_file: String,
    pub source_row: i64,
    pub ingested_at: String,
    /// Same hash as the paired `raw_staging` row
    pub record_hash_raw: String,
    /// Lossless JSON of the raw record, source field order preserved
    pub raw_payload_json: String,
}

/// The `raw_staging` columns the normalization stage needs
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StagedMember {
    pub load_run_id: String,
    pub source_vendor: String,
    pub source_file: String,
    pub source_row: i64,
    pub record_hash_raw: String,
    pub first_name_raw: Option<String>,
    pub last_name_raw: Option<String>,
    pub dob_raw: Option<String>,
    pub relationship_raw: Option<String>,
    pub plan_type: Option<String>,
    pub provider: Option<String>,
    pub ingested_at: String,
}

/// One `silver_members` row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SilverMember {
    pub load_run_id: String,
    pub source_vendor: String,
    pub source_file: String,
    pub source_row: i64,
    pub record_hash_raw: String,
    pub first_name_norm: Option<String>,
    pub last_name_norm: Option<String>,
    pub dob_norm: Option<String>,
    pub relationship_norm: String,
    pub plan_type: Option<String>,
    pub provider: Option<String>,
    pub first_name_raw: Option<String>,
    pub last_name_raw: Option<String>,
    pub dob_raw: Option<String>,
    pub relationship_raw: Option<String>,
    pub ingested_at: String,
    pub cleaned_at: String,
}
