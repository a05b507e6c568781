//! Run controller
//!
//! Drives one load run through the stages in order, persisting the
//! `load_runs` ledger row at every state transition:
//!
//! ```text
//! INITIATED → SCHEMA_READY → INGESTED → NORMALIZED → VALIDATED → COMPLETE
//! ```
//!
//! Any fatal stage error moves the run to FAILED and halts the later stages.
//! Stage failures are reported through the returned [`RunSummary`] (state
//! FAILED, `error` set); an `Err` means the run could not be tracked at all
//! (warehouse unreachable or unprovisionable).

use elig_common::config::RunConfig;
use elig_common::db::{open_warehouse, provision_warehouse};
use elig_common::LoadRunId;
use sqlx::SqlitePool;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::config::{NormalizationConfig, VendorRegistry};
use crate::db::{audit, runs};
use crate::error::{IngestError, IngestResult};
use crate::models::{LoadRun, QualitySummary, RunState, RunSummary, StagingManifest};
use crate::services::ingestor::Ingestor;
use crate::services::manifest::{build_manifest, write_manifest};
use crate::services::normalizer::{Normalizer, OTHER};
use crate::services::validator;

/// Pipeline driver bound to one warehouse and one run configuration
pub struct RunController {
    config: RunConfig,
    pool: SqlitePool,
}

impl RunController {
    pub fn new(config: RunConfig, pool: SqlitePool) -> Self {
        Self { config, pool }
    }

    /// Open the configured warehouse file and bind a controller to it
    pub async fn open(config: RunConfig) -> IngestResult<Self> {
        let pool = open_warehouse(&config.database).await?;
        Ok(Self::new(config, pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Full pipeline under a fresh run id
    pub async fn run(&self) -> IngestResult<RunSummary> {
        self.run_with_id(LoadRunId::generate()).await
    }

    /// Full pipeline under a caller-chosen run id
    pub async fn run_with_id(&self, run_id: LoadRunId) -> IngestResult<RunSummary> {
        let (mut run, mut summary) = self.start(run_id).await?;

        let result = self.run_stages(&mut run, &mut summary).await;
        self.finish(&mut run, &mut summary, result).await?;
        Ok(summary)
    }

    /// Schema provisioning and ingestion only; the run is left INGESTED
    pub async fn ingest_only(&self) -> IngestResult<RunSummary> {
        let (mut run, mut summary) = self.start(LoadRunId::generate()).await?;

        let result = async {
            let registry = self.load_registry()?;
            self.ingest_stage(&mut run, &mut summary, &registry).await
        }
        .await;
        self.finish(&mut run, &mut summary, result).await?;
        Ok(summary)
    }

    /// Normalize an existing run
    ///
    /// The ledger row is advanced only when INGESTED → NORMALIZED is a legal
    /// transition for it; otherwise the stage still runs and a warning is logged.
    pub async fn normalize_only(&self, run_id: LoadRunId) -> IngestResult<RunSummary> {
        provision_warehouse(&self.pool)
            .await
            .map_err(IngestError::from_provisioning)?;
        let mut run = runs::load_run(&self.pool, &run_id).await?;
        let mut summary = RunSummary::new(run_id.as_str(), ledger_state(&run));

        let result = self.normalize_stage(&run_id, &mut summary).await;
        match result {
            Ok(()) => {
                self.advance_if_legal(&mut run, &mut summary, RunState::Normalized)
                    .await?
            }
            Err(e) => self.fail_if_tracked(&mut run, &mut summary, e).await?,
        }
        Ok(summary)
    }

    /// Validate an existing run, completing it when it passes
    pub async fn validate_only(&self, run_id: LoadRunId) -> IngestResult<RunSummary> {
        provision_warehouse(&self.pool)
            .await
            .map_err(IngestError::from_provisioning)?;
        let mut run = runs::load_run(&self.pool, &run_id).await?;
        let mut summary = RunSummary::new(run_id.as_str(), ledger_state(&run));

        match self.validate_stage(&run_id, &mut summary).await {
            Ok(()) => {
                self.advance_if_legal(&mut run, &mut summary, RunState::Validated)
                    .await?;
                self.advance_if_legal(&mut run, &mut summary, RunState::Complete)
                    .await?;
            }
            Err(e) => self.fail_if_tracked(&mut run, &mut summary, e).await?,
        }
        Ok(summary)
    }

    /// Fingerprint the configured input files without ingesting them
    pub async fn manifest_only(&self) -> IngestResult<(StagingManifest, PathBuf)> {
        let registry = self.load_registry()?;
        let manifest = build_manifest(&LoadRunId::generate(), &registry, &self.config);
        let path = write_manifest(&manifest, &self.config)?;
        Ok((manifest, path))
    }

    /// Provision the warehouse and record the run as INITIATED then SCHEMA_READY
    async fn start(&self, run_id: LoadRunId) -> IngestResult<(LoadRun, RunSummary)> {
        let mut run = LoadRun::with_id(run_id);
        info!(run_id = %run.run_id, "Starting load run");

        provision_warehouse(&self.pool)
            .await
            .map_err(IngestError::from_provisioning)?;

        let mut summary = RunSummary::new(run.run_id.as_str(), run.state);
        runs::save_run(&self.pool, &run, Some(&summary)).await?;
        self.advance(&mut run, &mut summary, RunState::SchemaReady)
            .await?;
        Ok((run, summary))
    }

    async fn run_stages(&self, run: &mut LoadRun, summary: &mut RunSummary) -> IngestResult<()> {
        let registry = self.load_registry()?;

        let manifest = build_manifest(&run.run_id, &registry, &self.config);
        let manifest_path = write_manifest(&manifest, &self.config)?;
        summary.manifest_path = Some(manifest_path.display().to_string());

        self.ingest_stage(run, summary, &registry).await?;

        self.normalize_stage(&run.run_id, summary).await?;
        self.advance(run, summary, RunState::Normalized).await?;

        self.validate_stage(&run.run_id, summary).await?;
        self.advance(run, summary, RunState::Validated).await?;
        self.advance(run, summary, RunState::Complete).await?;
        Ok(())
    }

    fn load_registry(&self) -> IngestResult<VendorRegistry> {
        let registry = VendorRegistry::load_excluding(
            &self.config.mappings_dir,
            &self.config.vendors,
            Some(&self.config.normalization_config),
        )?;
        if registry.is_empty() {
            warn!(
                "No vendor configs found in {}",
                self.config.mappings_dir.display()
            );
        }
        Ok(registry)
    }

    async fn ingest_stage(
        &self,
        run: &mut LoadRun,
        summary: &mut RunSummary,
        registry: &VendorRegistry,
    ) -> IngestResult<()> {
        let ingestor = Ingestor::new(
            self.pool.clone(),
            run.run_id.clone(),
            self.config.input_dir.clone(),
            self.config.batch_size,
        );
        summary.vendors = ingestor.ingest_all(registry).await;

        let failed: Vec<String> = summary
            .failed_vendors()
            .into_iter()
            .map(|v| v.vendor.clone())
            .collect();
        if !failed.is_empty() {
            return Err(IngestError::VendorsFailed { vendors: failed });
        }

        info!(
            run_id = %run.run_id,
            vendors = summary.vendors.len(),
            rows = summary.ingested_rows(),
            "Ingestion complete"
        );
        self.advance(run, summary, RunState::Ingested).await
    }

    async fn normalize_stage(&self, run_id: &LoadRunId, summary: &mut RunSummary) -> IngestResult<()> {
        let config = NormalizationConfig::load_or_default(&self.config.normalization_config)?;
        let normalizer = Normalizer::new(self.pool.clone(), config);
        summary.normalization = Some(normalizer.normalize_run(run_id).await?);

        let quality = audit::quality_summary(&self.pool, run_id.as_str()).await?;
        log_quality(&quality);
        summary.quality = Some(quality);
        Ok(())
    }

    async fn validate_stage(&self, run_id: &LoadRunId, summary: &mut RunSummary) -> IngestResult<()> {
        let report = validator::audit_run(&self.pool, run_id).await?;
        summary.validation = Some(report.clone());
        validator::check(report)?;
        Ok(())
    }

    async fn advance(
        &self,
        run: &mut LoadRun,
        summary: &mut RunSummary,
        new_state: RunState,
    ) -> IngestResult<()> {
        let transition = run.transition_to(new_state)?;
        summary.state = run.state;
        info!(
            run_id = %transition.run_id,
            from = %transition.old_state,
            to = %transition.new_state,
            "Run state transition"
        );
        runs::save_run(&self.pool, run, Some(summary)).await?;
        Ok(())
    }

    /// Record the stage result: a failure moves the run to FAILED
    async fn finish(
        &self,
        run: &mut LoadRun,
        summary: &mut RunSummary,
        result: IngestResult<()>,
    ) -> IngestResult<()> {
        match result {
            Ok(()) => {
                info!(run_id = %run.run_id, state = %run.state, "Load run finished");
                Ok(())
            }
            Err(e) => self.record_failure(run, summary, e).await,
        }
    }

    async fn record_failure(
        &self,
        run: &mut LoadRun,
        summary: &mut RunSummary,
        err: IngestError,
    ) -> IngestResult<()> {
        let reason = err.to_string();
        error!(run_id = %run.run_id, from = %run.state, error = %reason, "Load run failed");
        run.fail(reason.clone())?;
        summary.state = run.state;
        summary.error = Some(reason);
        runs::save_run(&self.pool, run, Some(summary)).await?;
        Ok(())
    }

    async fn advance_if_legal(
        &self,
        run: &mut Option<LoadRun>,
        summary: &mut RunSummary,
        new_state: RunState,
    ) -> IngestResult<()> {
        match run {
            Some(r) if r.state.next() == Some(new_state) => {
                self.advance(r, summary, new_state).await
            }
            Some(r) => {
                warn!(
                    run_id = %r.run_id,
                    state = %r.state,
                    target = %new_state,
                    "Ledger not updated: transition not allowed from current state"
                );
                Ok(())
            }
            None => {
                warn!(run_id = %summary.run_id, "Run not in ledger; state not tracked");
                Ok(())
            }
        }
    }

    async fn fail_if_tracked(
        &self,
        run: &mut Option<LoadRun>,
        summary: &mut RunSummary,
        err: IngestError,
    ) -> IngestResult<()> {
        match run {
            Some(r) if !r.is_terminal() => self.record_failure(r, summary, err).await,
            _ => {
                error!(run_id = %summary.run_id, error = %err, "Stage failed");
                summary.error = Some(err.to_string());
                Ok(())
            }
        }
    }
}

fn ledger_state(run: &Option<LoadRun>) -> RunState {
    run.as_ref().map(|r| r.state).unwrap_or(RunState::Initiated)
}

fn log_quality(quality: &QualitySummary) {
    for c in &quality.raw_completeness {
        info!(
            vendor = %c.vendor,
            total = c.total,
            missing_names = c.missing_names,
            missing_dob = c.missing_dob,
            missing_address = c.missing_address,
            "Raw completeness"
        );
    }
    for r in &quality.relationships {
        if r.relationship_norm == OTHER {
            warn!(
                vendor = %r.vendor,
                code = ?r.relationship_raw,
                count = r.count,
                "Unmapped relationship code"
            );
        } else {
            debug!(
                vendor = %r.vendor,
                code = ?r.relationship_raw,
                label = %r.relationship_norm,
                count = r.count,
                "Relationship mapping"
            );
        }
    }
    for d in &quality.failed_dates {
        warn!(vendor = %d.vendor, dob_raw = ?d.dob_raw, count = d.count, "Unparsed date of birth");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elig_common::config::TomlConfig;
    use elig_common::db::open_in_memory;
    use tempfile::TempDir;

    async fn controller(root: &std::path::Path) -> RunController {
        let config = RunConfig::from_toml(root, TomlConfig::default()).unwrap();
        RunController::new(config, open_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_missing_mappings_dir_fails_run() {
        let dir = TempDir::new().unwrap();
        let ctl = controller(dir.path()).await;

        let summary = ctl.run().await.unwrap();
        assert_eq!(summary.state, RunState::Failed);
        assert!(summary.error.unwrap().contains("Config not found"));

        let run_id = LoadRunId::parse(&summary.run_id).unwrap();
        let ledger = runs::load_run(ctl.pool(), &run_id).await.unwrap().unwrap();
        assert_eq!(ledger.state, RunState::Failed);
    }

    #[tokio::test]
    async fn test_normalize_unknown_run_is_untracked() {
        let dir = TempDir::new().unwrap();
        let ctl = controller(dir.path()).await;

        let run_id = LoadRunId::parse("never_ran").unwrap();
        let summary = ctl.normalize_only(run_id.clone()).await.unwrap();
        assert_eq!(summary.normalization.unwrap().rows, 0);
        assert!(runs::load_run(ctl.pool(), &run_id).await.unwrap().is_none());
    }
}
