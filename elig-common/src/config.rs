//! Run configuration loading and root folder resolution
//!
//! Every path the pipeline touches is derived from one [`RunConfig`] that is
//! passed explicitly to each stage. Resolution order for the project root:
//! 1. Command-line argument (highest priority)
//! 2. `ELIG_ROOT` environment variable
//! 3. Current working directory
//!
//! Within the root, `pipeline.toml` supplies overrides; a missing file is not
//! an error (defaults are used and [`RunConfig::config_file`] stays `None`).
//! Loading runs before logging is initialized, so callers report which file
//! was used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable consulted for the project root
pub const ROOT_ENV_VAR: &str = "ELIG_ROOT";

/// Name of the optional per-project configuration file
pub const CONFIG_FILE_NAME: &str = "pipeline.toml";

/// Default number of records per dual-write batch
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Logging section of `pipeline.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (overridden by `RUST_LOG`)
    pub level: String,
    /// Also write logs to `<output_dir>/logs/pipeline.log`
    pub write_file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            write_file: true,
        }
    }
}

/// On-disk shape of `pipeline.toml`; relative paths are resolved against the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub input_dir: PathBuf,
    pub mappings_dir: PathBuf,
    pub normalization_config: PathBuf,
    pub output_dir: PathBuf,
    /// Warehouse file; defaults to `<output_dir>/warehouse.db`
    pub database: Option<PathBuf>,
    pub batch_size: usize,
    /// Vendor names to ingest, in order; empty means every config in `mappings_dir`
    pub vendors: Vec<String>,
    /// Record zero-row input files as failed in the manifest
    pub require_non_empty: bool,
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input"),
            mappings_dir: PathBuf::from("mappings"),
            normalization_config: PathBuf::from("mappings/relationship_normalization.yaml"),
            output_dir: PathBuf::from("output"),
            database: None,
            batch_size: DEFAULT_BATCH_SIZE,
            vendors: Vec::new(),
            require_non_empty: true,
            logging: LoggingConfig::default(),
        }
    }
}

/// Fully resolved configuration for one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub root: PathBuf,
    pub input_dir: PathBuf,
    pub mappings_dir: PathBuf,
    pub normalization_config: PathBuf,
    pub output_dir: PathBuf,
    pub database: PathBuf,
    pub batch_size: usize,
    pub vendors: Vec<String>,
    pub require_non_empty: bool,
    pub logging: LoggingConfig,
    /// The `pipeline.toml` that was read, if any
    pub config_file: Option<PathBuf>,
}

impl RunConfig {
    /// Load `<root>/pipeline.toml` (if present) and resolve every path against `root`
    pub fn from_root(root: &Path) -> Result<Self> {
        let config_path = root.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Self::from_toml(root, TomlConfig::default());
        }
        let mut config = Self::from_toml(root, load_toml_config(&config_path)?)?;
        config.config_file = Some(config_path);
        Ok(config)
    }

    /// Resolve a parsed TOML config against `root`
    pub fn from_toml(root: &Path, config: TomlConfig) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".to_string()));
        }

        let output_dir = root.join(&config.output_dir);
        let database = match &config.database {
            Some(path) => root.join(path),
            None => output_dir.join("warehouse.db"),
        };

        Ok(Self {
            root: root.to_path_buf(),
            input_dir: root.join(&config.input_dir),
            mappings_dir: root.join(&config.mappings_dir),
            normalization_config: root.join(&config.normalization_config),
            output_dir,
            database,
            batch_size: config.batch_size,
            vendors: config.vendors,
            require_non_empty: config.require_non_empty,
            logging: config.logging,
            config_file: None,
        })
    }

    /// Directory receiving per-run manifests
    pub fn manifests_dir(&self) -> PathBuf {
        self.output_dir.join("manifests")
    }

    /// Log file path used when `logging.write_file` is set
    pub fn log_file(&self) -> PathBuf {
        self.output_dir.join("logs").join("pipeline.log")
    }
}

/// Resolve the project root following the documented priority order
pub fn resolve_root_folder(cli_arg: Option<&Path>, env_var_name: &str) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: working directory
    PathBuf::from(".")
}

/// Parse a `pipeline.toml` file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}
