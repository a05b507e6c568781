//! Load run identifiers
//!
//! A load run id is `YYYYMMDDTHHMMSSZ_<8 hex>`: the UTC start time plus the
//! first eight hex digits of a fresh UUIDv4. It is opaque to every stage; only
//! equality matters.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{Error, Result};

/// Identifier scoping one pipeline execution
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadRunId(String);

impl LoadRunId {
    /// Generate a new run id from the current time and a random suffix
    pub fn generate() -> Self {
        let ts = Utc::now().format("%Y%m%dT%H%M%SZ");
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("{}_{}", ts, &suffix[..8]))
    }

    /// Accept an externally supplied run id (e.g. `--run-id` on the CLI)
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("load run id is empty".to_string()));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(Error::InvalidInput(format!(
                "load run id contains whitespace: {:?}",
                s
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LoadRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LoadRunId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
