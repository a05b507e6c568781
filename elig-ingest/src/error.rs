//! Error types for the ingestion engine
//!
//! Each variant is one of the pipeline's fatal conditions. Data-quality
//! problems (unparsable dates, unmapped relationship codes) are never errors;
//! they are counted in the run summary instead.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for ingestion operations
pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// Ingestion engine error
#[derive(Debug, Error)]
pub enum IngestError {
    /// A vendor or normalization config document does not exist
    #[error("Config not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// A config document is malformed or semantically invalid
    #[error("Invalid config {path}: {reason}")]
    ConfigInvalid { path: String, reason: String },

    /// Vendor input file or spreadsheet sheet is missing
    #[error("Source not found: {0}")]
    SourceNotFound(String),

    /// Required warehouse table absent after provisioning
    #[error("Schema integrity error: {0}")]
    SchemaIntegrity(String),

    /// A source record could not be parsed
    #[error("Parse failure in {file} at line {line}: {reason}")]
    ParseFailure {
        file: String,
        line: usize,
        reason: String,
    },

    /// At least one vendor failed during ingestion; the others were still ingested
    #[error("Ingestion failed for vendors: {}", .vendors.join(", "))]
    VendorsFailed { vendors: Vec<String> },

    /// Post-hoc validation found broken invariants
    #[error("Integrity violation for run {run_id}: {}", .violations.join("; "))]
    IntegrityViolation {
        run_id: String,
        violations: Vec<String>,
    },

    /// Run state machine misuse (e.g. normalizing an unknown run)
    #[error("Invalid run state: {0}")]
    InvalidState(String),

    /// elig-common error
    #[error(transparent)]
    Common(#[from] elig_common::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// Shorthand for [`IngestError::ConfigInvalid`]
    pub fn config_invalid(path: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Lift a provisioning failure into the engine's schema error kind
    pub fn from_provisioning(err: elig_common::Error) -> Self {
        match err {
            elig_common::Error::SchemaIntegrity(msg) => Self::SchemaIntegrity(msg),
            other => Self::Common(other),
        }
    }
}
