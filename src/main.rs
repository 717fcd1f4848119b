//! Site-Harvest main entry point
//!
//! This is the command-line interface for the Site-Harvest crawler and
//! corpus analyzer.

use anyhow::{bail, Context};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use site_harvest::analysis::{Analyzer, CancelFlag};
use site_harvest::config::{load_config_with_hash, Config};
use site_harvest::corpus::ContentStore;
use site_harvest::crawler::Coordinator;
use site_harvest::output::{
    load_statistics, print_analysis_summary, print_crawl_summary, print_statistics,
};
use site_harvest::render::{run_render_pass, ChromiumRenderer};
use site_harvest::storage::{RunStatus, SqliteStorage, Storage};
use site_harvest::url::{canonicalize_url, extract_domain};
use tracing_subscriber::EnvFilter;

/// Site-Harvest: mirror a website and analyze it in batches
///
/// Site-Harvest crawls a site from one seed URL while respecting robots.txt
/// and a per-host politeness delay, stores pages and their embedded
/// resources, renders one page in a headless browser, and then feeds the
/// stored corpus to an analysis service in token-budgeted batches.
#[derive(Parser, Debug)]
#[command(name = "site-harvest")]
#[command(version)]
#[command(about = "Mirror a website and analyze it in batches", long_about = None)]
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

    /// Validate config and show what would be harvested without fetching anything
    #[arg(long, conflicts_with_all = ["stats", "crawl_only", "analyze_only"])]
    dry_run: bool,

    /// Crawl and render, but skip the analysis stage
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "analyze_only"])]
    crawl_only: bool,

    /// Analyze the corpus of the latest recorded run without crawling
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "crawl_only"])]
    analyze_only: bool,

    /// With --analyze-only, continue the run's latest unfinished session
    #[arg(long, requires = "analyze_only")]
    resume: bool,

    /// Show corpus statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "crawl_only", "analyze_only"])]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.analyze_only {
        handle_analyze_only(&config, cli.resume).await?;
    } else {
        handle_harvest(config, &config_hash, cli.crawl_only).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_harvest=info,warn"),
            1 => EnvFilter::new("site_harvest=debug,info"),
            2 => EnvFilter::new("site_harvest=trace,debug"),
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

/// Handles the --dry-run mode: prints the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Site-Harvest Dry Run ===\n");

    println!("Target:");
    println!("  Seed URL: {}", config.target.seed_url);
    println!("  Render URL: {}", config.render_url());

    println!("\nCrawler Configuration:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!(
        "  Max concurrent requests: {}",
        config.crawler.max_concurrent_requests
    );
    println!(
        "  Politeness delay: {}ms",
        config.crawler.politeness_delay_ms
    );
    println!("  Obey robots.txt: {}", config.crawler.obey_robots);
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Content: {}", config.output.content_dir);
    println!("  Database: {}", config.output.database_path);
    println!("  API endpoints: {}", config.output.api_endpoints_path);
    println!("  Message log: {}", config.output.message_log_path);
    println!("  Reports: {}", config.output.reports_dir);

    println!("\nRendering:");
    if config.render.enabled {
        println!(
            "  Settle {}ms, scroll settle {}ms, navigation timeout {}ms",
            config.render.settle_ms,
            config.render.scroll_settle_ms,
            config.render.navigation_timeout_ms
        );
    } else {
        println!("  Disabled");
    }

    println!("\nAnalysis:");
    if config.analysis.enabled {
        println!("  Model: {}", config.analysis.model);
        println!("  Token ceiling: {}", config.analysis.token_ceiling);
        println!("  Token counter: {:?}", config.analysis.token_counter);
        println!("  Turn delay: {}s", config.analysis.turn_delay_secs);
        println!(
            "  Skipped extensions: {}",
            config.analysis.skip_extensions.join(", ")
        );
    } else {
        println!("  Disabled");
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows corpus statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;

    match load_statistics(&storage, Path::new(&config.output.content_dir), None)? {
        Some(stats) => print_statistics(&stats),
        None => println!("No runs recorded yet"),
    }

    Ok(())
}

/// Handles the main operation: crawl, render, then analyze
async fn handle_harvest(config: Config, config_hash: &str, crawl_only: bool) -> anyhow::Result<()> {
    let mut coordinator = Coordinator::new(config.clone(), config_hash)?;

    let report = match coordinator.run().await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };
    print_crawl_summary(&report);

    let store = coordinator.store();

    if config.render.enabled {
        render_stage(&config, &store).await;
    }

    if crawl_only || !config.analysis.enabled {
        tracing::info!("Skipping analysis");
        return Ok(());
    }

    analyze(&config, &store, None).await
}

/// Handles the --analyze-only mode: analyzes the latest recorded run
///
/// With `resume`, an interrupted or failed session over that run is
/// continued instead of starting a new one.
async fn handle_analyze_only(config: &Config, resume: bool) -> anyhow::Result<()> {
    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let Some(run) = storage.get_latest_run()? else {
        bail!(
            "No runs recorded in {}; crawl first",
            config.output.database_path
        );
    };

    let unfinished = if resume {
        storage
            .get_latest_session(run.id)?
            .filter(|session| session.status != RunStatus::Completed)
            .map(|session| session.id)
    } else {
        None
    };
    if resume && unfinished.is_none() {
        tracing::info!("No unfinished session for run {}, starting a new one", run.id);
    }

    let seed = canonicalize_url(&run.seed_url)?;
    let domain = extract_domain(&seed).context("recorded seed URL has no host")?;
    tracing::info!("Analyzing run {} ({})", run.id, run.seed_url);

    let store = ContentStore::open(
        &config.output.content_dir,
        &domain,
        Arc::new(Mutex::new(storage)),
        run.id,
    )?;

    analyze(config, &store, unfinished).await
}

/// Renders the configured page; failures are logged and the run continues
async fn render_stage(config: &Config, store: &ContentStore) {
    let renderer = ChromiumRenderer::new(&config.render);
    match run_render_pass(
        &renderer,
        config.render_url(),
        store,
        Path::new(&config.output.message_log_path),
    )
    .await
    {
        Ok(summary) => tracing::info!(
            "Rendering stored {} scripts ({} deobfuscated), {} styles and {} messages",
            summary.scripts,
            summary.deobfuscated,
            summary.styles,
            summary.messages
        ),
        Err(e) => tracing::error!("Dynamic rendering failed: {}", e),
    }
}

/// Runs the analysis session; Ctrl-C stops it before the next turn
async fn analyze(config: &Config, store: &ContentStore, resume: Option<i64>) -> anyhow::Result<()> {
    let cancel = CancelFlag::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, no further turns will be sent");
            trigger.cancel();
        }
    });

    let analyzer = Analyzer::from_config(&config.analysis, &config.output.reports_dir)
        .context("failed to set up the analysis client")?
        .with_cancel_flag(cancel);

    let report = match resume {
        Some(session_id) => analyzer.resume(store, session_id).await?,
        None => analyzer.run(store).await?,
    };
    print_analysis_summary(&report);
    Ok(())
}
