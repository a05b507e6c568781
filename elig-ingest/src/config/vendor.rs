//! Vendor mapping configuration
//!
//! One document per vendor declares where its feed lives, how to read it, and
//! how source fields land in `raw_staging` columns. Documents are compiled into
//! an ordered list of [`MappingRule`]s at load time; the canonicalizer only ever
//! sees the compiled form.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use super::document::{find_document, is_config_document, load_document};
use crate::error::{IngestError, IngestResult};
use crate::models::FieldValue;

/// File stem of the relationship/date normalization document
pub const NORMALIZATION_DOC_STEM: &str = "relationship_normalization";

/// Canonical column receiving the `extra_payload` JSON blob
pub const EXTRA_PAYLOAD_FIELD: &str = "extra_payload";

/// Vendor feed format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    PipeDelimited,
    Xlsx,
    Jsonl,
}

impl FileFormat {
    /// Field delimiter used when the config does not override it
    pub fn default_delimiter(&self) -> Option<u8> {
        match self {
            FileFormat::Csv => Some(b','),
            FileFormat::PipeDelimited => Some(b'|'),
            FileFormat::Xlsx | FileFormat::Jsonl => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::PipeDelimited => "pipe_delimited",
            FileFormat::Xlsx => "xlsx",
            FileFormat::Jsonl => "jsonl",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" | "delimited" => Ok(FileFormat::Csv),
            "pipe_delimited" | "txt" => Ok(FileFormat::PipeDelimited),
            "xlsx" | "spreadsheet" => Ok(FileFormat::Xlsx),
            "jsonl" | "ndjson" => Ok(FileFormat::Jsonl),
            other => Err(format!("unknown format '{}'", other)),
        }
    }
}

/// Computed field kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Derivation {
    /// Zero-padded `YYYY-MM-DD` assembled from three source paths, no calendar check
    JoinYmd {
        year: String,
        month: String,
        day: String,
    },
}

/// One compiled mapping instruction
///
/// Rules are evaluated in list order and a later rule overwrites an earlier
/// one that wrote the same field.
#[derive(Debug, Clone, PartialEq)]
pub enum MappingRule {
    Constant { field: String, value: FieldValue },
    Path { field: String, path: String },
    ForceNull { field: String },
    Derive { field: String, derivation: Derivation },
    /// Listed source paths, serialized as one JSON object into `extra_payload`
    ExtraPayload { paths: Vec<String> },
}

impl MappingRule {
    /// Canonical field written by this rule
    pub fn target(&self) -> &str {
        match self {
            MappingRule::Constant { field, .. }
            | MappingRule::Path { field, .. }
            | MappingRule::ForceNull { field }
            | MappingRule::Derive { field, .. } => field,
            MappingRule::ExtraPayload { .. } => EXTRA_PAYLOAD_FIELD,
        }
    }
}

/// `nulls` may be written as a list or as a map whose keys are the field names
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NullsDocument {
    List(Vec<String>),
    Map(Map<String, Value>),
}

impl NullsDocument {
    fn into_fields(self) -> Vec<String> {
        match self {
            NullsDocument::List(fields) => fields,
            NullsDocument::Map(map) => map.into_iter().map(|(k, _)| k).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DerivationDocument {
    #[serde(rename = "type", alias = "kind")]
    kind: Option<String>,
    year: Option<String>,
    month: Option<String>,
    day: Option<String>,
}

/// On-disk shape of a vendor document
#[derive(Debug, Deserialize)]
struct VendorDocument {
    source_vendor: Option<String>,
    file: Option<String>,
    format: Option<String>,
    delimiter: Option<String>,
    sheet: Option<String>,
    #[serde(default)]
    constants: Map<String, Value>,
    #[serde(default)]
    mapping: Map<String, Value>,
    nulls: Option<NullsDocument>,
    #[serde(default)]
    derivations: Map<String, Value>,
    #[serde(default)]
    extra_payload: Vec<String>,
}

/// Validated, compiled configuration for one vendor
#[derive(Debug, Clone, PartialEq)]
pub struct VendorConfig {
    pub source_vendor: String,
    /// Input file name, relative to the input directory
    pub file: String,
    pub format: FileFormat,
    /// Effective delimiter for delimited formats
    pub delimiter: Option<u8>,
    /// Spreadsheet sheet; the first sheet when unset
    pub sheet: Option<String>,
    /// Document this config was loaded from
    pub origin: PathBuf,
    rules: Vec<MappingRule>,
}

impl VendorConfig {
    /// Load and compile a vendor document
    pub fn load(path: &Path) -> IngestResult<Self> {
        let doc: VendorDocument = load_document(path)?;
        let config = Self::compile(path, doc)?;
        debug!(
            vendor = %config.source_vendor,
            format = %config.format,
            rules = config.rules.len(),
            "Loaded vendor config from {}",
            path.display()
        );
        Ok(config)
    }

    /// Compile document text as if it were loaded from `path`
    pub fn from_str_at(path: &Path, text: &str) -> IngestResult<Self> {
        let doc: VendorDocument = super::document::parse_document(path, text)?;
        Self::compile(path, doc)
    }

    fn compile(path: &Path, doc: VendorDocument) -> IngestResult<Self> {
        let invalid = |reason: String| IngestError::config_invalid(path.display(), reason);

        let source_vendor = required(doc.source_vendor, "source_vendor").map_err(invalid)?;
        let file = required(doc.file, "file").map_err(invalid)?;
        let format: FileFormat = required(doc.format, "format")
            .and_then(|f| f.parse::<FileFormat>())
            .map_err(invalid)?;

        let delimiter = match doc.delimiter {
            Some(d) => Some(parse_delimiter(&d).map_err(invalid)?),
            None => format.default_delimiter(),
        };

        let mut rules = Vec::new();

        for (field, value) in doc.constants {
            rules.push(MappingRule::Constant {
                field,
                value: FieldValue::from_json(value),
            });
        }

        for (field, source) in doc.mapping {
            match source {
                Value::String(source_path) if !source_path.trim().is_empty() => {
                    rules.push(MappingRule::Path {
                        field,
                        path: source_path,
                    })
                }
                other => {
                    return Err(invalid(format!(
                        "mapping for '{}' must be a non-empty source path, got {}",
                        field, other
                    )))
                }
            }
        }

        for field in doc.nulls.map(NullsDocument::into_fields).unwrap_or_default() {
            rules.push(MappingRule::ForceNull { field });
        }

        for (field, raw) in doc.derivations {
            let parts: DerivationDocument = serde_json::from_value(raw)
                .map_err(|e| invalid(format!("derivation '{}': {}", field, e)))?;
            let derivation = compile_derivation(&field, parts).map_err(invalid)?;
            rules.push(MappingRule::Derive { field, derivation });
        }

        if !doc.extra_payload.is_empty() {
            rules.push(MappingRule::ExtraPayload {
                paths: doc.extra_payload,
            });
        }

        Ok(Self {
            source_vendor,
            file,
            format,
            delimiter,
            sheet: doc.sheet.filter(|s| !s.trim().is_empty()),
            origin: path.to_path_buf(),
            rules,
        })
    }

    /// Compiled rules in evaluation order
    pub fn rules(&self) -> &[MappingRule] {
        &self.rules
    }

    /// Every canonical field this config writes, first-write order, no repeats
    pub fn target_fields(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.rules
            .iter()
            .map(MappingRule::target)
            .filter(|f| seen.insert(*f))
            .collect()
    }

    /// Reject configs that write fields `raw_staging` does not have
    pub fn check_targets(&self, columns: &[String]) -> IngestResult<()> {
        let unknown: Vec<&str> = self
            .target_fields()
            .into_iter()
            .filter(|f| !columns.iter().any(|c| c == f))
            .collect();

        if unknown.is_empty() {
            Ok(())
        } else {
            Err(IngestError::config_invalid(
                self.origin.display(),
                format!("fields not in raw_staging: {}", unknown.join(", ")),
            ))
        }
    }

    /// Location of this vendor's feed under `input_dir`
    pub fn input_path(&self, input_dir: &Path) -> PathBuf {
        input_dir.join(&self.file)
    }
}

fn required(value: Option<String>, key: &str) -> Result<String, String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(format!("missing required key '{}'", key)),
    }
}

fn parse_delimiter(raw: &str) -> Result<u8, String> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() => Ok(c as u8),
        _ => Err(format!(
            "delimiter must be a single ASCII character, got {:?}",
            raw
        )),
    }
}

fn compile_derivation(field: &str, parts: DerivationDocument) -> Result<Derivation, String> {
    match parts.kind.as_deref() {
        Some("join_ymd_to_string") => {
            let part = |v: Option<String>, name: &str| {
                v.filter(|p| !p.trim().is_empty()).ok_or_else(|| {
                    format!("derivation '{}' is missing the '{}' path", field, name)
                })
            };
            Ok(Derivation::JoinYmd {
                year: part(parts.year, "year")?,
                month: part(parts.month, "month")?,
                day: part(parts.day, "day")?,
            })
        }
        Some(other) => Err(format!(
            "derivation '{}' has unknown type '{}'",
            field, other
        )),
        None => Err(format!("derivation '{}' has no type", field)),
    }
}

/// The set of vendor configs for one run, in processing order
#[derive(Debug, Clone, Default)]
pub struct VendorRegistry {
    configs: Vec<VendorConfig>,
}

impl VendorRegistry {
    /// Load vendor documents from `dir`
    ///
    /// With a non-empty `vendors` list, `<dir>/<vendor>.{toml,yaml,yml}` is loaded
    /// for each name in order. Otherwise every document in `dir` is loaded in
    /// file-name order, except the normalization document.
    pub fn load(dir: &Path, vendors: &[String]) -> IngestResult<Self> {
        Self::load_excluding(dir, vendors, None)
    }

    /// [`VendorRegistry::load`], additionally skipping the document at `exclude`
    pub fn load_excluding(
        dir: &Path,
        vendors: &[String],
        exclude: Option<&Path>,
    ) -> IngestResult<Self> {
        let paths = if vendors.is_empty() {
            discover_documents(dir, exclude)?
        } else {
            vendors
                .iter()
                .map(|v| {
                    find_document(dir, v)
                        .ok_or_else(|| IngestError::ConfigNotFound(dir.join(format!("{}.yaml", v))))
                })
                .collect::<IngestResult<Vec<_>>>()?
        };

        let mut registry = Self::default();
        for path in paths {
            registry.push(VendorConfig::load(&path)?)?;
        }

        info!(
            vendors = registry.len(),
            "Loaded vendor configs from {}",
            dir.display()
        );
        Ok(registry)
    }

    /// Add a config; a repeated `source_vendor` is rejected
    pub fn push(&mut self, config: VendorConfig) -> IngestResult<()> {
        if let Some(existing) = self.get(&config.source_vendor) {
            return Err(IngestError::config_invalid(
                config.origin.display(),
                format!(
                    "source_vendor '{}' already defined in {}",
                    config.source_vendor,
                    existing.origin.display()
                ),
            ));
        }
        self.configs.push(config);
        Ok(())
    }

    pub fn get(&self, vendor: &str) -> Option<&VendorConfig> {
        self.configs.iter().find(|c| c.source_vendor == vendor)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VendorConfig> {
        self.configs.iter()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

fn discover_documents(dir: &Path, exclude: Option<&Path>) -> IngestResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(IngestError::ConfigNotFound(dir.to_path_buf()));
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || !is_config_document(&path) {
            continue;
        }
        let is_normalization_doc = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s == NORMALIZATION_DOC_STEM)
            .unwrap_or(false);
        let is_excluded = exclude.map(|e| e == path.as_path()).unwrap_or(false);
        if is_normalization_doc || is_excluded {
            continue;
        }
        paths.push(path);
    }
    paths.sort();
    Ok(paths)
}
