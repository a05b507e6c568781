//! Dual-write ingestion (stage 1)
//!
//! Every source record yields one `raw_staging` row and one
//! `raw_staging_payload` row carrying the same identity tuple and hash. Both
//! are buffered and flushed together every `batch_size` records and at end of
//! file; each flush is one transaction. No transaction spans a whole vendor
//! file, so a failure part way through a feed leaves the batches already
//! committed in place. The validation stage detects that state.

use elig_common::db::schema_sync::SchemaIntrospector;
use elig_common::db::table_schemas::RAW_STAGING;
use elig_common::time::utc_now_iso;
use elig_common::LoadRunId;
use sqlx::SqlitePool;
use std::path::PathBuf;
use tracing::{error, info};

use crate::config::{VendorConfig, VendorRegistry};
use crate::db::raw_staging::{raw_insert_sql, write_batch};
use crate::error::{IngestError, IngestResult};
use crate::models::{CanonicalRow, FieldValue, PayloadRecord, VendorOutcome, VendorReport};
use crate::services::canonicalizer::canonicalize;
use crate::services::content_hasher::content_hash;
use crate::source::open_source;

/// Stage 1 writer for one run
pub struct Ingestor {
    pool: SqlitePool,
    run_id: LoadRunId,
    input_dir: PathBuf,
    batch_size: usize,
}

/// Raw and payload rows waiting for the next flush
struct PendingBatch {
    raw: Vec<CanonicalRow>,
    payload: Vec<PayloadRecord>,
}

impl PendingBatch {
    fn with_capacity(n: usize) -> Self {
        Self {
            raw: Vec::with_capacity(n),
            payload: Vec::with_capacity(n),
        }
    }

    fn len(&self) -> usize {
        self.raw.len()
    }
}

impl Ingestor {
    pub fn new(pool: SqlitePool, run_id: LoadRunId, input_dir: PathBuf, batch_size: usize) -> Self {
        Self {
            pool,
            run_id,
            input_dir,
            batch_size: batch_size.max(1),
        }
    }

    /// Ingest one vendor's feed, returning the number of records written
    ///
    /// Fails with `ConfigInvalid` if the config writes a field `raw_staging`
    /// lacks, `SourceNotFound` if the feed or sheet is missing, and
    /// `ParseFailure` on the first malformed record.
    pub async fn ingest_vendor(&self, config: &VendorConfig) -> IngestResult<u64> {
        let vendor = config.source_vendor.as_str();

        let columns = SchemaIntrospector::column_names(&self.pool, RAW_STAGING).await?;
        if columns.is_empty() {
            return Err(IngestError::SchemaIntegrity(format!(
                "{} does not exist",
                RAW_STAGING
            )));
        }
        config.check_targets(&columns)?;

        let path = config.input_path(&self.input_dir);
        let records = open_source(config, &path)?;
        info!(vendor, file = %config.file, format = %config.format, "Ingesting vendor feed");

        let raw_sql = raw_insert_sql(&columns);
        let ingested_at = utc_now_iso();
        let run_id = self.run_id.as_str();

        let mut batch = PendingBatch::with_capacity(self.batch_size);
        let mut written: u64 = 0;

        for (idx, record) in records.enumerate() {
            let record = record?;
            let source_row = (idx + 1) as i64;

            let mut row = canonicalize(config, &record);
            row.set("source_vendor", FieldValue::text(vendor));
            row.set("source_file", FieldValue::text(&config.file));
            row.set("source_row", FieldValue::from(source_row));
            row.set("load_run_id", FieldValue::text(run_id));
            row.set("ingested_at", FieldValue::text(&ingested_at));

            let hash = content_hash(&row, &columns);
            row.set("record_hash_raw", FieldValue::text(&hash));

            batch.payload.push(PayloadRecord {
                load_run_id: run_id.to_string(),
                source_vendor: vendor.to_string(),
                source_file: config.file.clone(),
                source_row,
                ingested_at: ingested_at.clone(),
                record_hash_raw: hash,
                raw_payload_json: record.to_payload_json(),
            });
            batch.raw.push(row);

            if batch.len() >= self.batch_size {
                written += self.flush(&raw_sql, &columns, &mut batch).await?;
            }
        }

        if batch.len() > 0 {
            written += self.flush(&raw_sql, &columns, &mut batch).await?;
        }

        info!(vendor, rows = written, "Vendor ingested");
        Ok(written)
    }

    async fn flush(
        &self,
        raw_sql: &str,
        columns: &[String],
        batch: &mut PendingBatch,
    ) -> IngestResult<u64> {
        write_batch(&self.pool, raw_sql, columns, &batch.raw, &batch.payload).await?;
        let n = batch.len() as u64;
        batch.raw.clear();
        batch.payload.clear();
        Ok(n)
    }

    /// Ingest every vendor in registry order
    ///
    /// A failing vendor is recorded as [`VendorOutcome::Failed`] and the
    /// remaining vendors still run.
    pub async fn ingest_all(&self, registry: &VendorRegistry) -> Vec<VendorReport> {
        let mut reports = Vec::with_capacity(registry.len());

        for config in registry.iter() {
            let outcome = match self.ingest_vendor(config).await {
                Ok(rows) => VendorOutcome::Ingested { rows },
                Err(e) => {
                    error!(vendor = %config.source_vendor, error = %e, "Vendor ingestion failed");
                    VendorOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            reports.push(VendorReport {
                vendor: config.source_vendor.clone(),
                file: config.file.clone(),
                outcome,
            });
        }

        reports
    }
}
