//! Sumi-Harvest main entry point
//!
//! This is the command-line interface for running checkpointed acquisition
//! phases over a list of target URLs.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sumi_harvest::acquire::{
    build_http_client, AcquisitionEscalator, HttpFetcher, RequiredFieldsEvaluator, RetryPolicy,
};
use sumi_harvest::config::{load_config_with_hash, Config};
use sumi_harvest::pipeline::{batch_count, process_concurrently, BatchPipeline};
use sumi_harvest::storage::{is_valid_phase_name, CheckpointStore, FileCheckpointStore};
use sumi_harvest::url::parse_target_list;
use sumi_harvest::{HarvestError, RateLimiter};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Sumi-Harvest: a resumable, polite acquisition pipeline
///
/// Sumi-Harvest fetches each target through a cheap tier first and escalates
/// to a full fetch only when required fields are missing. Progress is saved
/// after every batch so an interrupted phase resumes where it stopped.
#[derive(Parser, Debug)]
#[command(name = "sumi-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resumable, polite acquisition pipeline", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Phase to run or inspect
    #[arg(long, value_name = "NAME")]
    phase: String,

    /// File with one target URL per line ('#' starts a comment)
    #[arg(
        long,
        value_name = "FILE",
        required_unless_present_any = ["status", "mark_complete"]
    )]
    targets: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the batch plan without fetching anything
    #[arg(long, conflicts_with_all = ["status", "mark_complete"])]
    dry_run: bool,

    /// Show checkpoint progress for the phase and exit
    #[arg(long, conflicts_with_all = ["dry_run", "mark_complete"])]
    status: bool,

    /// Mark the phase complete and exit
    #[arg(long, conflicts_with_all = ["dry_run", "status"])]
    mark_complete: bool,

    /// Mark the phase complete after a successful run
    #[arg(long, conflicts_with_all = ["dry_run", "status", "mark_complete"])]
    complete_when_done: bool,
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if !is_valid_phase_name(&cli.phase) {
        tracing::error!("Invalid phase name: {}", cli.phase);
        return Err(HarvestError::InvalidPhase(cli.phase).into());
    }

    // Handle different modes
    if cli.status {
        handle_status(&config, &cli.phase)?;
    } else if cli.mark_complete {
        handle_mark_complete(&config, &cli.phase)?;
    } else {
        let targets_path = cli
            .targets
            .as_deref()
            .ok_or("--targets is required to run a phase")?;
        let targets = load_targets(targets_path)?;

        if cli.dry_run {
            handle_dry_run(&config, &cli.phase, &targets)?;
        } else {
            handle_run(config, &cli.phase, targets, cli.complete_when_done).await?;
        }
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_harvest=info,warn"),
            1 => EnvFilter::new("sumi_harvest=debug,info"),
            2 => EnvFilter::new("sumi_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn load_targets(path: &Path) -> CliResult<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        tracing::error!("Failed to read targets from {}: {}", path.display(), e);
        e
    })?;
    let targets = parse_target_list(&content);
    tracing::info!("Loaded {} targets from {}", targets.len(), path.display());
    Ok(targets)
}

/// Handles the --dry-run mode: validates config and shows the batch plan
fn handle_dry_run(config: &Config, phase: &str, targets: &[String]) -> CliResult<()> {
    println!("=== Sumi-Harvest Dry Run ===\n");

    let batch_size = config.pipeline.batch_size_for(phase);
    let batches = batch_count(targets.len(), batch_size)?;

    println!("Pipeline:");
    println!(
        "  Checkpoint dir: {}",
        config.pipeline.checkpoint_dir.display()
    );
    println!("  Phase: {}", phase);
    println!("  Batch size: {}", batch_size);
    println!(
        "  Max concurrent workers: {}",
        config.pipeline.max_concurrent_workers
    );

    println!("\nAcquisition:");
    println!("  Max attempts: {}", config.acquisition.max_attempts);
    println!("  Tier 1 attempts: {}", config.acquisition.tier1_attempts);
    println!(
        "  Required fields: {}",
        config.acquisition.required_fields.join(", ")
    );
    println!(
        "  Retry: {} attempts, {}ms..{}ms x{}",
        config.retry.max_attempts,
        config.retry.wait_min_ms,
        config.retry.wait_max_ms,
        config.retry.multiplier
    );

    println!("\nRate Limits:");
    println!(
        "  Default: {} per {}ms",
        config.rate_limit.max_rate, config.rate_limit.period_ms
    );
    for entry in &config.rate_limit.domains {
        println!(
            "  - {}: {} per {}ms",
            entry.domain, entry.max_rate, entry.period_ms
        );
    }

    println!("\nUser Agent: {}", config.user_agent.header_value());

    // Only read an existing checkpoint directory; a dry run creates nothing
    let resume_point = if config.pipeline.checkpoint_dir.is_dir() {
        FileCheckpointStore::new(&config.pipeline.checkpoint_dir)?.resume_point(phase)?
    } else {
        0
    };

    println!("\n✓ Configuration is valid");
    println!(
        "✓ {} targets in {} batches; would start at batch {}",
        targets.len(),
        batches,
        resume_point.min(batches)
    );

    Ok(())
}

/// Handles the --status mode: shows checkpoint progress for a phase
fn handle_status(config: &Config, phase: &str) -> CliResult<()> {
    let store = FileCheckpointStore::new(&config.pipeline.checkpoint_dir)?;

    println!("Checkpoint dir: {}\n", store.root().display());

    let indices = store.batch_indices(phase)?;
    println!("Phase: {}", phase);
    println!("  Persisted batches: {}", indices.len());
    println!("  Resume point: {}", store.resume_point(phase)?);
    println!("  Complete: {}", store.is_phase_complete(phase)?);

    let completed = store.completed_phases()?;
    if !completed.is_empty() {
        println!("\nCompleted phases: {}", completed.join(", "));
    }

    Ok(())
}

/// Handles the --mark-complete mode
fn handle_mark_complete(config: &Config, phase: &str) -> CliResult<()> {
    let mut store = FileCheckpointStore::new(&config.pipeline.checkpoint_dir)?;
    store.mark_phase_complete(phase)?;
    println!("✓ Phase '{}' marked complete", phase);
    Ok(())
}

/// Handles the main acquisition run
async fn handle_run(
    config: Config,
    phase: &str,
    targets: Vec<String>,
    complete_when_done: bool,
) -> CliResult<()> {
    let client = build_http_client(&config.user_agent)?;
    let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit)?);

    // Ctrl-C stops limiter and backoff waits; the batch in flight is then
    // discarded instead of saved
    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current batch");
            shutdown.cancel();
        }
    });

    let escalator = AcquisitionEscalator::new(
        limiter,
        Arc::new(RequiredFieldsEvaluator),
        Arc::new(HttpFetcher::shallow(client.clone())),
        Arc::new(HttpFetcher::full(client)),
    )
    .with_retry(RetryPolicy::from_config(&config.retry))
    .with_config(&config.acquisition)
    .with_cancellation(cancel.clone());

    let store = FileCheckpointStore::new(&config.pipeline.checkpoint_dir)?;
    let mut pipeline = BatchPipeline::new(store);

    let batch_size = config.pipeline.batch_size_for(phase);
    let workers = config.pipeline.max_concurrent_workers;
    let required = config.acquisition.required_fields.as_slice();
    let escalator = &escalator;
    let cancel = &cancel;

    let result = pipeline
        .run(phase, &targets, batch_size, |batch| async move {
            let records = process_concurrently(batch, workers, |target: String| async move {
                escalator.acquire(&target, required).await.into_record(target)
            })
            .await;

            if cancel.is_cancelled() {
                return Err(anyhow::Error::new(HarvestError::Cancelled));
            }
            Ok(records)
        })
        .await;

    let records = match result {
        Ok(records) => records,
        Err(e) => {
            tracing::error!("Phase '{}' stopped: {}", phase, e);
            return Err(e.into());
        }
    };

    let sufficient = records
        .iter()
        .filter(|r| r.get("sufficient") == Some(&serde_json::Value::Bool(true)))
        .count();
    let degraded = records.iter().filter(|r| r.get("error").is_some()).count();
    tracing::info!(
        "Phase '{}' finished: {} records, {} sufficient, {} degraded",
        phase,
        records.len(),
        sufficient,
        degraded
    );

    if complete_when_done {
        pipeline.store_mut().mark_phase_complete(phase)?;
        tracing::info!("Phase '{}' marked complete", phase);
    }

    Ok(())
}
