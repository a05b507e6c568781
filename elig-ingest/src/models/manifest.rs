//! Staging manifest: a fingerprint of every vendor file a run reads

use serde::{Deserialize, Serialize};

/// Outcome of inspecting one input file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestStatus {
    Success,
    Failed,
}

/// One vendor file as seen before ingestion
///
/// Failed entries keep the vendor, file and path; the measured fields are
/// zero or empty and `error` says why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestFileEntry {
    pub source_vendor: String,
    pub source_file: String,
    /// Path relative to the project root
    pub relative_path: String,
    pub size_bytes: u64,
    /// RFC 3339, seconds precision
    pub modified_time_utc: String,
    pub sha256: String,
    pub row_count_read: u64,
    pub status: ManifestStatus,
    pub error: String,
}

impl ManifestFileEntry {
    pub fn failed(
        source_vendor: impl Into<String>,
        source_file: impl Into<String>,
        relative_path: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            source_vendor: source_vendor.into(),
            source_file: source_file.into(),
            relative_path: relative_path.into(),
            size_bytes: 0,
            modified_time_utc: String::new(),
            sha256: String::new(),
            row_count_read: 0,
            status: ManifestStatus::Failed,
            error: error.into(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == ManifestStatus::Failed
    }
}

/// Manifest document written per run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagingManifest {
    pub load_run_id: String,
    pub ingested_at_utc: String,
    pub input_dir: String,
    pub files: Vec<ManifestFileEntry>,
}

impl StagingManifest {
    pub fn failed_files(&self) -> impl Iterator<Item = &ManifestFileEntry> {
        self.files.iter().filter(|f| f.is_failed())
    }
}
