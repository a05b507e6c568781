//! elig-ingest - Eligibility warehouse ingestion CLI
//!
//! Runs the full pipeline or a single stage against the project rooted at
//! `--root` (or `ELIG_ROOT`, or the working directory) and prints the run
//! summary as JSON. Exits non-zero when the run fails.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use elig_common::config::{resolve_root_folder, RunConfig, CONFIG_FILE_NAME, ROOT_ENV_VAR};
use elig_common::LoadRunId;
use elig_ingest::models::{RunState, RunSummary};
use elig_ingest::services::RunController;

/// Command-line arguments for elig-ingest
#[derive(Parser, Debug)]
#[command(name = "elig-ingest")]
#[command(about = "Eligibility feed ingestion into the warehouse")]
#[command(version)]
struct Args {
    /// Project root containing pipeline.toml, input/ and mappings/
    #[arg(long, global = true, env = ROOT_ENV_VAR)]
    root: Option<PathBuf>,

    /// Warehouse file (overrides pipeline.toml)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Records per dual-write batch (overrides pipeline.toml)
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every stage under a new load run id
    Run,
    /// Provision the schema and ingest every vendor (stage 1 only)
    Ingest,
    /// Normalize an existing run into silver_members
    Normalize {
        #[arg(long)]
        run_id: String,
    },
    /// Audit an existing run
    Validate {
        #[arg(long)]
        run_id: String,
    },
    /// Write the staging manifest without ingesting
    Manifest,
}

fn load_config(args: &Args) -> Result<RunConfig> {
    let root = resolve_root_folder(args.root.as_deref(), ROOT_ENV_VAR);
    let mut config = RunConfig::from_root(&root)
        .with_context(|| format!("Failed to load configuration from {}", root.display()))?;

    if let Some(database) = &args.database {
        config.database = database.clone();
    }
    if let Some(batch_size) = args.batch_size {
        if batch_size == 0 {
            bail!("--batch-size must be at least 1");
        }
        config.batch_size = batch_size;
    }
    Ok(config)
}

/// Stdout logging plus an optional plain-text file under the output directory
fn init_tracing(config: &RunConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let file_layer = if config.logging.write_file {
        let log_path = config.log_file();
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open log file {}", log_path.display()))?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

fn print_summary(summary: &RunSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("Failed to render run summary")?;
    println!("{}", json);
    Ok(())
}

fn finish(summary: RunSummary) -> Result<()> {
    print_summary(&summary)?;
    match (&summary.state, &summary.error) {
        (RunState::Failed, Some(error)) => bail!("Run {} failed: {}", summary.run_id, error),
        (RunState::Failed, None) => bail!("Run {} failed", summary.run_id),
        (_, Some(error)) => bail!("Run {}: {}", summary.run_id, error),
        _ => Ok(()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_tracing(&config)?;

    info!("Starting elig-ingest {}", env!("CARGO_PKG_VERSION"));
    info!("Project root: {}", config.root.display());
    match &config.config_file {
        Some(path) => info!("Configuration: {}", path.display()),
        None => warn!("No {} found; using default layout", CONFIG_FILE_NAME),
    }
    info!("Warehouse: {}", config.database.display());

    let controller = RunController::open(config)
        .await
        .context("Failed to open warehouse")?;

    match args.command {
        Command::Run => {
            let summary = controller.run().await.context("Pipeline run aborted")?;
            finish(summary)
        }
        Command::Ingest => {
            let summary = controller.ingest_only().await.context("Ingestion aborted")?;
            finish(summary)
        }
        Command::Normalize { run_id } => {
            let run_id = LoadRunId::parse(&run_id).context("Invalid --run-id")?;
            let summary = controller
                .normalize_only(run_id)
                .await
                .context("Normalization aborted")?;
            finish(summary)
        }
        Command::Validate { run_id } => {
            let run_id = LoadRunId::parse(&run_id).context("Invalid --run-id")?;
            let summary = controller
                .validate_only(run_id)
                .await
                .context("Validation aborted")?;
            finish(summary)
        }
        Command::Manifest => {
            let (manifest, path) = controller
                .manifest_only()
                .await
                .context("Failed to write staging manifest")?;
            let json = serde_json::to_string_pretty(&manifest)
                .context("Failed to render manifest")?;
            println!("{}", json);
            info!("Manifest written to {}", path.display());
            Ok(())
        }
    }
}
