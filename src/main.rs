//! Marquee main entry point
//!
//! This is the command-line interface for the Marquee event ingester.

use anyhow::{Context, Result};
use clap::Parser;
use marquee::catalog::{import_entry, sweep_stale, Actor};
use marquee::clock::{Clock, SystemClock};
use marquee::config::{load_config_with_hash, Config};
use marquee::crawler::{production_coordinator, run_once};
use marquee::output::{load_statistics, print_entries, print_run_summary, print_statistics};
use marquee::storage::{CatalogStore, SqliteCatalog};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Marquee: an event listing ingester
///
/// Marquee discovers event pages on a listing site, extracts event details,
/// and keeps a local catalog in sync while preserving operator decisions.
#[derive(Parser, Debug)]
#[command(name = "marquee")]
#[command(version)]
#[command(about = "An event listing ingester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Run once now, then again on the configured interval until Ctrl-C
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "import", "sweep_stale"])]
    watch: bool,

    /// Validate config and show what would be ingested without writing the catalog
    #[arg(long, conflicts_with_all = ["stats", "import", "sweep_stale"])]
    dry_run: bool,

    /// Show catalog statistics and recent runs, then exit
    #[arg(long, conflicts_with_all = ["import", "sweep_stale"])]
    stats: bool,

    /// Mark the entry for this source URL as imported
    #[arg(long, value_name = "SOURCE_URL", requires = "by", conflicts_with = "sweep_stale")]
    import: Option<String>,

    /// Operator performing the import
    #[arg(long, value_name = "OPERATOR", requires = "import")]
    by: Option<String>,

    /// Notes stored with the import
    #[arg(long, value_name = "TEXT", requires = "import")]
    notes: Option<String>,

    /// Mark entries not seen within the staleness window as inactive
    #[arg(long)]
    sweep_stale: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(config, &config_hash).await
    } else if cli.stats {
        handle_stats(&config)
    } else if let Some(source_url) = &cli.import {
        let operator = cli.by.clone().unwrap_or_default();
        handle_import(&config, source_url, operator, cli.notes.as_deref())
    } else if cli.sweep_stale {
        handle_sweep(&config)
    } else if cli.watch {
        handle_watch(config, &config_hash).await
    } else {
        handle_run(config, &config_hash).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("marquee=info,warn"),
            1 => EnvFilter::new("marquee=debug,info"),
            2 => EnvFilter::new("marquee=trace,debug"),
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

fn open_store(config: &Config) -> Result<SqliteCatalog> {
    let path = Path::new(&config.catalog.database_path);
    SqliteCatalog::new(path)
        .with_context(|| format!("Failed to open catalog database {}", path.display()))
}

/// Handles the default mode: one ingestion run
async fn handle_run(config: Config, config_hash: &str) -> Result<()> {
    let summary = run_once(config, config_hash).await?;
    print_run_summary(&summary);
    Ok(())
}

/// Handles --watch: runs now, then every `schedule.interval-minutes`
async fn handle_watch(config: Config, config_hash: &str) -> Result<()> {
    let period = Duration::from_secs(config.schedule.interval_minutes * 60);
    let store = open_store(&config)?;
    let coordinator = production_coordinator(config, config_hash, store)?;

    tracing::info!(
        interval_minutes = period.as_secs() / 60,
        "Watching; press Ctrl-C to stop"
    );

    let runs = coordinator
        .watch(period, tokio::signal::ctrl_c(), |result| match result {
            Ok(summary) => print_run_summary(&summary),
            Err(e) => tracing::error!(error = %e, "Ingestion run failed"),
        })
        .await;

    tracing::info!(runs, "Interrupted, stopping");
    Ok(())
}

/// Handles --dry-run: ingests into an in-memory catalog and prints it
async fn handle_dry_run(config: Config, config_hash: &str) -> Result<()> {
    println!("=== Marquee Dry Run ===\n");

    println!("Source:");
    println!("  Name: {}", config.source.name);
    println!("  Listing URL: {}", config.source.listing_url);
    println!("  Path prefix: {}", config.source.path_prefix);
    println!("  Exclude patterns: {:?}", config.source.exclude_patterns);
    println!("  Default city: {}", config.source.default_city);

    println!("\nPipeline:");
    println!("  Max links per run: {}", config.pipeline.max_links_per_run);
    println!(
        "  Max concurrent fetches: {}",
        config.pipeline.max_concurrent_fetches
    );
    println!("  Fetch timeout: {}s", config.pipeline.fetch_timeout_secs);

    println!("\nCatalog:");
    println!("  Database: {} (not written)", config.catalog.database_path);
    println!();

    let coordinator =
        production_coordinator(config, config_hash, SqliteCatalog::open_in_memory()?)?;
    let summary = coordinator.run_once().await?;

    let entries = coordinator
        .lock_store()?
        .list_entries(None)
        .context("Failed to list dry-run entries")?;
    println!("Would ingest {} entries:", entries.len());
    print_entries(&entries);
    println!();
    print_run_summary(&summary);

    Ok(())
}

/// Handles --stats: prints counts by lifecycle status and recent runs
fn handle_stats(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let stats = load_statistics(&store, 10)?;
    print_statistics(&stats);
    Ok(())
}

/// Handles --import: operator import of one entry
fn handle_import(
    config: &Config,
    source_url: &str,
    operator: String,
    notes: Option<&str>,
) -> Result<()> {
    let mut store = open_store(config)?;
    let entry = import_entry(
        &mut store,
        source_url,
        &Actor::Operator(operator),
        notes,
        SystemClock.now(),
    )?;

    println!("Imported: {} ({})", entry.title, entry.source_url);
    Ok(())
}

/// Handles --sweep-stale: marks unseen entries inactive
fn handle_sweep(config: &Config) -> Result<()> {
    let mut store = open_store(config)?;
    let window = i64::try_from(config.catalog.stale_after_hours)
        .ok()
        .and_then(chrono::Duration::try_hours)
        .context("stale-after-hours is out of range")?;
    let swept = sweep_stale(&mut store, window, SystemClock.now())?;

    println!(
        "Marked {} entries inactive (not seen in {}h)",
        swept, config.catalog.stale_after_hours
    );
    Ok(())
}
