//! Silver-layer normalization (stage 2)
//!
//! Three pure transforms applied to every raw row of a run:
//! - names: case-folded, reduced to `[a-z0-9]`
//! - dates: parsed with the vendor's pattern, re-emitted as `YYYY-MM-DD`
//! - relationships: looked up in the vendor's dictionary, `OTHER` when unmapped
//!
//! Unparsable dates and unmapped codes are data-quality signals, not errors;
//! they are counted in the [`NormalizationSummary`].
//!
//! The whole run is loaded into memory before transforming, so memory grows
//! linearly with run size.

use caseless::default_case_fold_str;
use chrono::{NaiveDate, NaiveDateTime};
use elig_common::time::utc_now_iso;
use elig_common::LoadRunId;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::config::normalization::fold_code;
use crate::config::NormalizationConfig;
use crate::db::{raw_staging, silver};
use crate::error::IngestResult;
use crate::models::{NormalizationSummary, SilverMember, StagedMember, VendorQuality};

/// Relationship label for codes without a mapping
pub const OTHER: &str = "OTHER";

/// Unicode case-fold, then keep only ASCII letters and digits; `None` stays `None`
///
/// Full folding expands characters such as `ß` to `ss` before the filter runs.
pub fn clean_name(raw: Option<&str>) -> Option<String> {
    raw.map(|s| {
        default_case_fold_str(s)
            .chars()
            .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            .collect()
    })
}

/// Parse `raw` (trimmed) with a strftime-style `pattern`
///
/// Patterns carrying a time component are accepted; only the date is kept.
pub fn parse_date(pattern: &str, raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, pattern)
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(raw, pattern).ok().map(|dt| dt.date()))
}

/// `YYYY-MM-DD`, or `None` when the value is null, unparsable, or the vendor has no pattern
pub fn normalize_date(config: &NormalizationConfig, vendor: &str, raw: Option<&str>) -> Option<String> {
    let pattern = config.date_format(vendor)?;
    let raw = raw?;
    parse_date(pattern, raw).map(|d| d.format("%Y-%m-%d").to_string())
}

/// Dictionary label for the folded code, [`OTHER`] when there is none
pub fn normalize_relationship(
    config: &NormalizationConfig,
    vendor: &str,
    raw: Option<&str>,
) -> String {
    match (config.relationship_map(vendor), raw) {
        (Some(map), Some(code)) => map
            .get(&fold_code(code))
            .cloned()
            .unwrap_or_else(|| OTHER.to_string()),
        _ => OTHER.to_string(),
    }
}

/// Stage 2 writer
pub struct Normalizer {
    pool: SqlitePool,
    config: NormalizationConfig,
}

impl Normalizer {
    pub fn new(pool: SqlitePool, config: NormalizationConfig) -> Self {
        Self { pool, config }
    }

    /// Transform one raw row; pure apart from the supplied timestamp
    pub fn normalize_member(&self, staged: StagedMember, cleaned_at: &str) -> SilverMember {
        let vendor = staged.source_vendor.as_str();
        SilverMember {
            first_name_norm: clean_name(staged.first_name_raw.as_deref()),
            last_name_norm: clean_name(staged.last_name_raw.as_deref()),
            dob_norm: normalize_date(&self.config, vendor, staged.dob_raw.as_deref()),
            relationship_norm: normalize_relationship(
                &self.config,
                vendor,
                staged.relationship_raw.as_deref(),
            ),
            load_run_id: staged.load_run_id,
            source_vendor: staged.source_vendor,
            source_file: staged.source_file,
            source_row: staged.source_row,
            record_hash_raw: staged.record_hash_raw,
            plan_type: staged.plan_type,
            provider: staged.provider,
            first_name_raw: staged.first_name_raw,
            last_name_raw: staged.last_name_raw,
            dob_raw: staged.dob_raw,
            relationship_raw: staged.relationship_raw,
            ingested_at: staged.ingested_at,
            cleaned_at: cleaned_at.to_string(),
        }
    }

    /// Normalize every raw row of `run_id` into `silver_members`
    ///
    /// Existing silver rows for the run are replaced in the same transaction.
    pub async fn normalize_run(&self, run_id: &LoadRunId) -> IngestResult<NormalizationSummary> {
        let staged = raw_staging::load_staged_members(&self.pool, run_id.as_str()).await?;
        if staged.is_empty() {
            warn!(run_id = %run_id, "No raw rows found for run");
        }

        for vendor in self.unconfigured_vendors(&staged) {
            warn!(vendor = %vendor, "No date format configured; dob_norm will be null");
        }

        let cleaned_at = utc_now_iso();
        let members: Vec<SilverMember> = staged
            .into_iter()
            .map(|s| self.normalize_member(s, &cleaned_at))
            .collect();

        let summary = summarize(run_id.as_str(), &members);
        silver::replace_run_members(&self.pool, run_id.as_str(), &members).await?;

        info!(
            run_id = %run_id,
            rows = summary.rows,
            null_dob = summary.null_dob,
            other_relationship = summary.other_relationship,
            "Normalization complete"
        );
        Ok(summary)
    }

    fn unconfigured_vendors(&self, staged: &[StagedMember]) -> Vec<String> {
        let mut vendors: Vec<String> = staged
            .iter()
            .filter(|s| self.config.date_format(&s.source_vendor).is_none())
            .map(|s| s.source_vendor.clone())
            .collect();
        vendors.sort();
        vendors.dedup();
        vendors
    }
}

/// Per-vendor and total data-quality counters
pub fn summarize(run_id: &str, members: &[SilverMember]) -> NormalizationSummary {
    let mut per_vendor: BTreeMap<&str, VendorQuality> = BTreeMap::new();

    for m in members {
        let entry = per_vendor
            .entry(m.source_vendor.as_str())
            .or_insert_with(|| VendorQuality {
                vendor: m.source_vendor.clone(),
                ..Default::default()
            });
        entry.rows += 1;
        if m.dob_norm.is_none() {
            entry.null_dob += 1;
        }
        if m.relationship_norm == OTHER {
            entry.other_relationship += 1;
        }
    }

    let vendors: Vec<VendorQuality> = per_vendor.into_values().collect();
    NormalizationSummary {
        run_id: run_id.to_string(),
        rows: vendors.iter().map(|v| v.rows).sum(),
        null_dob: vendors.iter().map(|v| v.null_dob).sum(),
        other_relationship: vendors.iter().map(|v| v.other_relationship).sum(),
        vendors,
    }
}
