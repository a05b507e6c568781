//! Staging manifest (stage 0b)
//!
//! Before ingestion every configured vendor file is fingerprinted: size,
//! modification time, SHA-256 and a data row count. A file that cannot be
//! read is recorded as failed; it never aborts the manifest. Writing the
//! manifest document itself is fatal on error.

use chrono::{DateTime, Utc};
use elig_common::config::RunConfig;
use elig_common::time::{to_iso_seconds, utc_now_iso};
use elig_common::LoadRunId;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{VendorConfig, VendorRegistry};
use crate::error::IngestResult;
use crate::models::{ManifestFileEntry, ManifestStatus, StagingManifest};
use crate::source::count_records;

/// Name of the copy of the most recent manifest in the output directory
pub const LATEST_MANIFEST: &str = "staging_manifest_latest.json";

/// SHA-256 of a file, read in 1MB chunks
pub fn file_sha256(path: &Path) -> IngestResult<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 1024 * 1024];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

fn relative_to(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Fingerprint one vendor file; failures become a failed entry
pub fn describe_file(
    config: &VendorConfig,
    root: &Path,
    input_dir: &Path,
    require_non_empty: bool,
) -> ManifestFileEntry {
    let path = config.input_path(input_dir);
    let relative_path = relative_to(root, &path);

    match measure(config, &path, require_non_empty) {
        Ok((size_bytes, modified, sha256, rows)) => ManifestFileEntry {
            source_vendor: config.source_vendor.clone(),
            source_file: config.file.clone(),
            relative_path,
            size_bytes,
            modified_time_utc: modified,
            sha256,
            row_count_read: rows,
            status: ManifestStatus::Success,
            error: String::new(),
        },
        Err(reason) => {
            warn!(vendor = %config.source_vendor, error = %reason, "Manifest entry failed");
            ManifestFileEntry::failed(
                config.source_vendor.as_str(),
                config.file.as_str(),
                relative_path,
                reason,
            )
        }
    }
}

fn measure(
    config: &VendorConfig,
    path: &Path,
    require_non_empty: bool,
) -> Result<(u64, String, String, u64), String> {
    let rows = count_records(config, path).map_err(|e| e.to_string())?;
    if require_non_empty && rows == 0 {
        return Err(format!("{} contains no data rows", config.file));
    }

    let metadata = fs::metadata(path).map_err(|e| e.to_string())?;
    let modified = metadata
        .modified()
        .map(|t| to_iso_seconds(DateTime::<Utc>::from(t)))
        .map_err(|e| e.to_string())?;
    let sha256 = file_sha256(path).map_err(|e| e.to_string())?;

    debug!(vendor = %config.source_vendor, rows, bytes = metadata.len(), "Fingerprinted input file");
    Ok((metadata.len(), modified, sha256, rows))
}

/// Fingerprint every vendor file in registry order
pub fn build_manifest(
    run_id: &LoadRunId,
    registry: &VendorRegistry,
    config: &RunConfig,
) -> StagingManifest {
    let files = registry
        .iter()
        .map(|vendor| describe_file(vendor, &config.root, &config.input_dir, config.require_non_empty))
        .collect();

    StagingManifest {
        load_run_id: run_id.to_string(),
        ingested_at_utc: utc_now_iso(),
        input_dir: config.input_dir.display().to_string(),
        files,
    }
}

/// Write `manifest_<run>.json` under the manifests directory and refresh the
/// latest copy in the output directory; returns the per-run path
pub fn write_manifest(manifest: &StagingManifest, config: &RunConfig) -> IngestResult<PathBuf> {
    let manifests_dir = config.manifests_dir();
    fs::create_dir_all(&manifests_dir)?;

    let json = serde_json::to_string_pretty(manifest)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let run_path = manifests_dir.join(format!("manifest_{}.json", manifest.load_run_id));
    fs::write(&run_path, &json)?;
    fs::write(config.output_dir.join(LATEST_MANIFEST), &json)?;

    let failed = manifest.failed_files().count();
    info!(
        files = manifest.files.len(),
        failed,
        "Wrote staging manifest {}",
        run_path.display()
    );
    Ok(run_path)
}
