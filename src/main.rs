//! Catalog-Harvest main entry point
//!
//! This is the command-line interface for the catalog crawler and loader.

use anyhow::Context;
use catalog_harvest::catalog::{read_id_list, write_id_list};
use catalog_harvest::config::{load_config_with_hash, Config};
use catalog_harvest::crawler::{list_artifacts, Crawler};
use catalog_harvest::loader::{find_missing_app_ids, load_applications, load_reviews};
use catalog_harvest::output::{
    load_statistics, print_crawl_summary, print_load_summary, print_review_summary,
    print_statistics,
};
use catalog_harvest::storage::open_store;
use catalog_harvest::{Dataset, HarvestError, WorkItem};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit status after an operator interrupt (128 + SIGINT)
const EXIT_INTERRUPTED: u8 = 130;

/// Catalog-Harvest: a resumable catalog crawler and relational loader
///
/// Catalog-Harvest walks a rate-limited remote catalog one item at a time,
/// recording every outcome durably so any run can be interrupted and
/// resumed, then loads the resulting batch artifacts into SQLite.
#[derive(Parser, Debug)]
#[command(name = "catalog-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resumable catalog crawler and relational loader", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl every catalog item that has no recorded outcome yet
    Crawl {
        /// Which dataset to harvest
        #[arg(long, default_value = "apps")]
        dataset: Dataset,
    },

    /// Re-crawl an explicit list of appids, retrying previous failures
    Backfill {
        /// File with one appid per line
        #[arg(value_name = "IDS_FILE")]
        ids_file: PathBuf,
    },

    /// Load batch artifacts into the database (both datasets by default)
    Load {
        /// Load application artifacts
        #[arg(long)]
        apps: bool,

        /// Load review artifacts
        #[arg(long)]
        reviews: bool,
    },

    /// List appids that have reviews but no application row
    FindMissing {
        /// Output file (default: <state-dir>/missing_appids.txt)
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Show crawl progress and table row counts
    Stats,

    /// Validate the configuration and print it
    CheckConfig,
}

/// How a command ended, short of an error
enum Outcome {
    Completed,
    Interrupted,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(Outcome::Completed) => ExitCode::SUCCESS,
        Ok(Outcome::Interrupted) => ExitCode::from(EXIT_INTERRUPTED),
        Err(e) => {
            match e.downcast_ref::<HarvestError>().and_then(HarvestError::phase) {
                Some(phase) => tracing::error!("Run aborted in {} phase: {:#}", phase, e),
                None => tracing::error!("Run aborted: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<Outcome> {
    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("invalid configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    match cli.command {
        Command::Crawl { dataset } => handle_crawl(&config, dataset).await,
        Command::Backfill { ids_file } => handle_backfill(&config, &ids_file).await,
        Command::Load { apps, reviews } => {
            // No flag means both
            let both = !apps && !reviews;
            handle_load(&config, apps || both, reviews || both)
        }
        Command::FindMissing { output } => handle_find_missing(&config, output),
        Command::Stats => handle_stats(&config),
        Command::CheckConfig => handle_check_config(&config),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_harvest=info,warn"),
            1 => EnvFilter::new("catalog_harvest=debug,info"),
            2 => EnvFilter::new("catalog_harvest=trace,debug"),
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

/// What a crawler should walk
enum CrawlJob {
    Catalog(Vec<WorkItem>),
    Ids(Vec<u64>),
}

/// Handles the crawl command
async fn handle_crawl(config: &Config, dataset: Dataset) -> anyhow::Result<Outcome> {
    let mut crawler = Crawler::open(config, dataset)?;
    let items = crawler.load_catalog(&config.crawler.state_dir).await?;
    tracing::info!("Catalog holds {} work items", items.len());

    drive(&mut crawler, CrawlJob::Catalog(items)).await
}

/// Handles the backfill command: only the apps dataset is backfilled
async fn handle_backfill(config: &Config, ids_file: &Path) -> anyhow::Result<Outcome> {
    let ids = read_id_list(ids_file)?;
    tracing::info!("Backfilling {} appids from {}", ids.len(), ids_file.display());

    let mut crawler = Crawler::open(config, Dataset::Apps)?;
    drive(&mut crawler, CrawlJob::Ids(ids)).await
}

/// How a crawl job stopped
#[derive(Debug)]
enum Stop<T> {
    Finished(T),
    Interrupted,
}

/// Maps the Ctrl-C listener's result onto how the job stops
///
/// A listener that could not be installed is an error, not an interrupt.
fn interrupt_stop<T>(signal: std::io::Result<()>) -> anyhow::Result<Stop<T>> {
    signal.context("failed to listen for Ctrl-C")?;
    Ok(Stop::Interrupted)
}

/// Runs a crawl job until it completes or the operator interrupts it
async fn drive(crawler: &mut Crawler, job: CrawlJob) -> anyhow::Result<Outcome> {
    let stopped = tokio::select! {
        result = async {
            match &job {
                CrawlJob::Catalog(items) => crawler.run(items).await,
                CrawlJob::Ids(ids) => crawler.backfill(ids).await,
            }
        } => Ok(Stop::Finished(result)),
        signal = tokio::signal::ctrl_c() => interrupt_stop(signal),
    };

    let stop = match stopped {
        Ok(stop) => stop,
        Err(e) => {
            // The crawl was abandoned mid-run; keep what it already fetched
            crawler.flush_pending()?;
            return Err(e);
        }
    };

    match stop {
        Stop::Finished(result) => {
            let summary = result?;
            print_crawl_summary(&summary);
            Ok(Outcome::Completed)
        }
        Stop::Interrupted => {
            tracing::warn!(
                "Interrupted; writing {} buffered records before exiting",
                crawler.buffered()
            );
            if let Some(path) = crawler.flush_pending()? {
                tracing::info!("Saved partial batch to {}", path.display());
            }
            tracing::warn!("Progress is recorded; rerun the same command to resume");
            Ok(Outcome::Interrupted)
        }
    }
}

/// Handles the load command
fn handle_load(config: &Config, apps: bool, reviews: bool) -> anyhow::Result<Outcome> {
    let mut store = open_store(&config.loader)?;

    if apps {
        let artifacts = list_artifacts(&config.crawler.data_dir, Dataset::Apps)?;
        tracing::info!("Loading {} application artifacts", artifacts.len());
        let summary = load_applications(&mut store, &artifacts, &config.loader)?;
        print_load_summary(&summary);
    }

    if reviews {
        let artifacts = list_artifacts(&config.crawler.data_dir, Dataset::Reviews)?;
        tracing::info!("Loading {} review artifacts", artifacts.len());
        let summary = load_reviews(&mut store, &artifacts, &config.loader)?;
        print_review_summary(&summary);
    }

    Ok(Outcome::Completed)
}

/// Handles the find-missing command
fn handle_find_missing(config: &Config, output: Option<PathBuf>) -> anyhow::Result<Outcome> {
    let store = open_store(&config.loader)?;
    let artifacts = list_artifacts(&config.crawler.data_dir, Dataset::Reviews)?;
    let missing = find_missing_app_ids(&store, &artifacts)?;

    if missing.is_empty() {
        tracing::info!("No applications with reviews are missing from the database");
        return Ok(Outcome::Completed);
    }

    let output = output.unwrap_or_else(|| config.crawler.state_dir.join("missing_appids.txt"));
    write_id_list(&output, &missing)?;
    tracing::warn!(
        "Found {} appids with reviews that are missing from the 'applications' table",
        missing.len()
    );
    tracing::info!(
        "Saved them to {}; run `backfill {}` to fetch them",
        output.display(),
        output.display()
    );

    Ok(Outcome::Completed)
}

/// Handles the stats command
fn handle_stats(config: &Config) -> anyhow::Result<Outcome> {
    println!("Database: {}\n", config.loader.database_path.display());

    let store = open_store(&config.loader)?;
    let stats = load_statistics(&store, &config.crawler.state_dir)?;
    print_statistics(&stats);

    Ok(Outcome::Completed)
}

/// Handles the check-config command
fn handle_check_config(config: &Config) -> anyhow::Result<Outcome> {
    println!("=== Catalog-Harvest Configuration ===\n");

    println!("API:");
    println!("  Catalog URL: {}", config.api.catalog_url);
    println!("  Store base URL: {}", config.api.store_base_url);
    println!("  User agent: {}", config.api.user_agent);
    println!("  Request delay: {}ms", config.api.request_delay_ms);
    println!(
        "  Retries: {} attempts, backoff {}ms x {}^n + up to {}ms jitter",
        config.api.max_attempts,
        config.api.backoff_unit_ms,
        config.api.backoff_base,
        config.api.jitter_ms
    );

    println!("\nCrawler:");
    println!("  State dir: {}", config.crawler.state_dir.display());
    println!("  Data dir: {}", config.crawler.data_dir.display());
    println!("  Batch size: {}", config.crawler.batch_size);

    println!("\nLoader:");
    println!("  Database: {}", config.loader.database_path.display());
    println!("  Batch size: {}", config.loader.batch_size);
    println!("  Review batch size: {}", config.loader.review_batch_size);

    println!("\n✓ Configuration is valid");

    Ok(Outcome::Completed)
}
