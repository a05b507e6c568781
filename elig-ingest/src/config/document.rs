//! Config document loading
//!
//! Vendor and normalization documents may be TOML or YAML; the file extension
//! picks the parser and both deserialize into the same serde structs.

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use crate::error::{IngestError, IngestResult};

/// Extensions recognized as config documents, in lookup priority order
pub const DOCUMENT_EXTENSIONS: &[&str] = &["toml", "yaml", "yml"];

/// True if `path` has a config document extension
pub fn is_config_document(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| DOCUMENT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Locate `<dir>/<stem>.{toml,yaml,yml}`, first match wins
pub fn find_document(dir: &Path, stem: &str) -> Option<PathBuf> {
    DOCUMENT_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", stem, ext)))
        .find(|p| p.is_file())
}

/// Read and deserialize one document
pub fn load_document<T: DeserializeOwned>(path: &Path) -> IngestResult<T> {
    if !path.is_file() {
        return Err(IngestError::ConfigNotFound(path.to_path_buf()));
    }

    let text = std::fs::read_to_string(path)?;
    parse_document(path, &text)
}

/// Deserialize document text, choosing the format from `path`'s extension
pub fn parse_document<T: DeserializeOwned>(path: &Path, text: &str) -> IngestResult<T> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "toml" => toml::from_str(text)
            .map_err(|e| IngestError::config_invalid(path.display(), e.to_string())),
        "yaml" | "yml" => serde_yaml::from_str(text)
            .map_err(|e| IngestError::config_invalid(path.display(), e.to_string())),
        other => Err(IngestError::config_invalid(
            path.display(),
            format!("unsupported document extension '{}'", other),
        )),
    }
}
