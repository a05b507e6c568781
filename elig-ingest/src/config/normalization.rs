//! Relationship and date normalization rules
//!
//! One document holds every vendor's relationship dictionary and date pattern:
//!
//! ```yaml
//! relationship_mappings:
//!   dental: { emp: employee, sps: spouse }
//! date_formats:
//!   dental: "%m/%d/%Y"
//! vocabulary: [employee, spouse, child]
//! ```
//!
//! Dictionary keys are lower-cased and trimmed at load so lookups only need to
//! fold the raw code the same way.

use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{info, warn};

use super::document::load_document;
use crate::error::{IngestError, IngestResult};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NormalizationDocument {
    relationship_mappings: HashMap<String, HashMap<String, String>>,
    date_formats: HashMap<String, String>,
    vocabulary: Option<Vec<String>>,
}

/// Per-vendor normalization rules
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizationConfig {
    relationship_mappings: HashMap<String, HashMap<String, String>>,
    date_formats: HashMap<String, String>,
    vocabulary: Option<BTreeSet<String>>,
}

impl NormalizationConfig {
    /// Load the document at `path`; absent is [`IngestError::ConfigNotFound`]
    pub fn load(path: &Path) -> IngestResult<Self> {
        let doc: NormalizationDocument = load_document(path)?;
        let config = Self::from_document(doc)
            .map_err(|reason| IngestError::config_invalid(path.display(), reason))?;
        info!(
            relationship_vendors = config.relationship_mappings.len(),
            date_vendors = config.date_formats.len(),
            "Loaded normalization config from {}",
            path.display()
        );
        Ok(config)
    }

    /// Like [`NormalizationConfig::load`], but an absent document yields empty rules
    ///
    /// With empty rules every date normalizes to null and every relationship to `OTHER`.
    pub fn load_or_default(path: &Path) -> IngestResult<Self> {
        match Self::load(path) {
            Err(IngestError::ConfigNotFound(missing)) => {
                warn!(
                    "Normalization config not found at {}; dates will be null and relationships OTHER",
                    missing.display()
                );
                Ok(Self::default())
            }
            other => other,
        }
    }

    fn from_document(doc: NormalizationDocument) -> Result<Self, String> {
        let relationship_mappings: HashMap<String, HashMap<String, String>> = doc
            .relationship_mappings
            .into_iter()
            .map(|(vendor, codes)| {
                let folded = codes
                    .into_iter()
                    .map(|(code, label)| (fold_code(&code), label))
                    .collect();
                (vendor, folded)
            })
            .collect();

        let vocabulary: Option<BTreeSet<String>> =
            doc.vocabulary.map(|v| v.into_iter().collect());

        if let Some(vocab) = &vocabulary {
            let mut unknown: Vec<String> = relationship_mappings
                .iter()
                .flat_map(|(vendor, codes)| {
                    codes
                        .values()
                        .filter(|label| !vocab.contains(label.as_str()))
                        .map(move |label| format!("{}:{}", vendor, label))
                })
                .collect();
            if !unknown.is_empty() {
                unknown.sort();
                return Err(format!(
                    "labels outside vocabulary: {}",
                    unknown.join(", ")
                ));
            }
        }

        Ok(Self {
            relationship_mappings,
            date_formats: doc.date_formats,
            vocabulary,
        })
    }

    /// Add or replace one vendor's relationship dictionary
    pub fn with_relationships<'a>(
        mut self,
        vendor: &str,
        codes: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let folded = codes
            .into_iter()
            .map(|(code, label)| (fold_code(code), label.to_string()))
            .collect();
        self.relationship_mappings.insert(vendor.to_string(), folded);
        self
    }

    /// Add or replace one vendor's date pattern
    pub fn with_date_format(mut self, vendor: &str, pattern: &str) -> Self {
        self.date_formats
            .insert(vendor.to_string(), pattern.to_string());
        self
    }

    pub fn relationship_map(&self, vendor: &str) -> Option<&HashMap<String, String>> {
        self.relationship_mappings.get(vendor)
    }

    pub fn date_format(&self, vendor: &str) -> Option<&str> {
        self.date_formats.get(vendor).map(String::as_str)
    }

    pub fn vocabulary(&self) -> Option<&BTreeSet<String>> {
        self.vocabulary.as_ref()
    }
}

/// Case-fold and trim a relationship code for dictionary lookup
pub fn fold_code(code: &str) -> String {
    code.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::document::parse_document;

    fn parse(text: &str) -> Result<NormalizationConfig, String> {
        let doc: NormalizationDocument =
            parse_document(Path::new("norm.yaml"), text).map_err(|e| e.to_string())?;
        NormalizationConfig::from_document(doc)
    }

    #[test]
    fn test_keys_are_folded_at_load() {
        let cfg = parse(
            "relationship_mappings:\n  dental:\n    ' EMP ': employee\n    Sps: spouse\ndate_formats:\n  dental: '%m/%d/%Y'\n",
        )
        .unwrap();
        let map = cfg.relationship_map("dental").unwrap();
        assert_eq!(map.get("emp").map(String::as_str), Some("employee"));
        assert_eq!(map.get("sps").map(String::as_str), Some("spouse"));
        assert_eq!(cfg.date_format("dental"), Some("%m/%d/%Y"));
        assert!(cfg.relationship_map("vision").is_none());
    }

    #[test]
    fn test_vocabulary_is_enforced() {
        let err = parse(
            "relationship_mappings:\n  dental:\n    emp: employee\n    x: partner\nvocabulary: [employee, spouse]\n",
        )
        .unwrap_err();
        assert!(err.contains("dental:partner"), "{}", err);

        let ok = parse("relationship_mappings:\n  dental:\n    emp: employee\nvocabulary: [employee]\n");
        assert!(ok.unwrap().vocabulary().unwrap().contains("employee"));
    }

    #[test]
    fn test_empty_document_is_valid() {
        let cfg = parse("{}").unwrap();
        assert_eq!(cfg, NormalizationConfig::default());
    }

    #[test]
    fn test_missing_document_falls_back_to_empty() {
        let temp = tempfile::TempDir::new().unwrap();
        let cfg = NormalizationConfig::load_or_default(&temp.path().join("absent.yaml")).unwrap();
        assert!(cfg.relationship_map("dental").is_none());
        assert!(NormalizationConfig::load(&temp.path().join("absent.yaml")).is_err());
    }
}
