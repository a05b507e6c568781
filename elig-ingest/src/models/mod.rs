//! Data models for the ingestion pipeline

pub mod load_run;
pub mod manifest;
pub mod member;
pub mod run_summary;
pub mod validation;
pub mod value;

pub use load_run::{LoadRun, RunState, StateTransition};
pub use manifest::{ManifestFileEntry, ManifestStatus, StagingManifest};
pub use member::{PayloadRecord, SilverMember, StagedMember};
pub use run_summary::{
    DateFailure, NormalizationSummary, QualitySummary, RawCompleteness, RelationshipCount,
    RunSummary, VendorOutcome, VendorQuality, VendorReport,
};
pub use validation::{ValidationReport, VendorCounts};
pub use value::{CanonicalRow, FieldValue, RawRecord};
