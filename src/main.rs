//! Catalog-Ripple main entry point
//!
//! This is the command-line interface for the Catalog-Ripple catalog paginator.

use anyhow::Context;
use catalog_ripple::config::{
    load_config_with_hash, validate, Config, ExtractTemplate, ScrapeMode,
};
use catalog_ripple::crawler::{
    run_scrape, CatalogTemplate, FetchMode, HttpBrowserDriver, HttpFetcher, ItemExtractor,
    NextDataExtractor, ScrapeOutcome, ScrapeRequest,
};
use catalog_ripple::fingerprint::FingerprintRotator;
use catalog_ripple::output::{print_summary, write_output, write_run_summary, OutputFormat};
use catalog_ripple::pagination::PaginationGuard;
use catalog_ripple::state::PageRef;
use catalog_ripple::url::parse_start_url;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Catalog-Ripple: a resilient catalog paginator
///
/// Catalog-Ripple walks an e-commerce catalog page by page, extracting
/// product records while rotating request fingerprints and retrying
/// transient failures, then writes the products as JSON and/or CSV.
#[derive(Parser, Debug)]
#[command(name = "catalog-ripple")]
#[command(version = "1.0.0")]
#[command(about = "A resilient catalog paginator", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults are used when omitted)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// First catalog page to scrape
    #[arg(long)]
    url: Option<String>,

    /// Fetch mode
    #[arg(long, value_enum)]
    mode: Option<ScrapeMode>,

    /// Maximum number of products (0 = unlimited)
    #[arg(long)]
    max_products: Option<usize>,

    /// Maximum number of pages per scrape
    #[arg(long)]
    max_pages: Option<u32>,

    /// Product file format
    #[arg(long, value_enum)]
    output_format: Option<OutputFormat>,

    /// Directory for product files
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Cancel the run after this many seconds, keeping what was scraped
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Validate config and show what would be scraped without fetching anything
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (mut config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, Some(hash))
        }
        None => (Config::default(), None),
    };

    apply_overrides(&mut config, &cli);
    validate(&config).context("invalid configuration")?;

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    watch_for_cancellation(cancel.clone(), cli.timeout_secs);

    let outcomes = handle_scrape(&config, cancel).await?;

    let items: Vec<_> = outcomes
        .iter()
        .flat_map(|outcome| outcome.items.iter().cloned())
        .collect();
    let written = write_output(&items, config.output.format, Path::new(&config.output.directory))
        .context("failed to write products")?;

    if let Some(summary_path) = &config.output.summary_path {
        write_run_summary(&outcomes, config_hash.as_deref(), Path::new(summary_path))
            .context("failed to write run summary")?;
    }

    if !cli.quiet {
        print_summary(&outcomes, &written);
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
            0 => EnvFilter::new("catalog_ripple=info,warn"),
            1 => EnvFilter::new("catalog_ripple=debug,info"),
            2 => EnvFilter::new("catalog_ripple=trace,debug"),
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

/// Command-line flags take precedence over the file
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(url) = &cli.url {
        config.scrape.start_url = url.clone();
    }
    if let Some(mode) = cli.mode {
        config.scrape.mode = mode;
    }
    if let Some(max_products) = cli.max_products {
        config.scrape.max_products = max_products;
    }
    if let Some(max_pages) = cli.max_pages {
        config.scrape.max_pages = max_pages;
    }
    if let Some(format) = cli.output_format {
        config.output.format = format;
    }
    if let Some(dir) = &cli.output_dir {
        config.output.directory = dir.display().to_string();
    }
}

/// Cancels the token on Ctrl-C or when the run timeout expires
fn watch_for_cancellation(cancel: CancellationToken, timeout_secs: Option<u64>) {
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after the current step");
            on_signal.cancel();
        }
    });

    if let Some(secs) = timeout_secs {
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    tracing::warn!("Run timeout of {}s reached, stopping", secs);
                    cancel.cancel();
                }
            }
        });
    }
}

/// Handles the --dry-run mode: shows what would be scraped
fn handle_dry_run(config: &Config) {
    println!("=== Catalog-Ripple Dry Run ===\n");

    println!("Scrape:");
    println!("  Start URL: {}", config.scrape.start_url);
    println!("  Mode: {:?}", config.scrape.mode);
    println!("  Max products: {}", budget_label(config.scrape.max_products));
    println!("  Max pages: {}", config.scrape.max_pages);

    println!("\nRetry:");
    println!("  Max attempts: {}", config.retry.max_attempts);
    println!(
        "  Backoff: {}ms x{} (max {}ms)",
        config.retry.base_delay_ms, config.retry.backoff_multiplier, config.retry.max_delay_ms
    );

    println!("\nFingerprints:");
    println!("  Rotation: {}", if config.fingerprints.enabled { "on" } else { "off" });
    println!("  Order: {:?}", config.fingerprints.rotation);
    println!("  User agents: {}", config.fingerprints.user_agents.len());
    println!("  Delay hint: {}ms", config.fingerprints.delay_hint_ms);

    println!("\nHTTP:");
    println!("  Request timeout: {}s", config.http.request_timeout_secs);
    println!("  Respect robots.txt: {}", config.http.respect_robots_txt);

    println!("\nExtraction:");
    println!("  Template: {:?}", config.extract.template);

    println!("\nOutput:");
    println!("  Directory: {}", config.output.directory);
    println!("  Format: {:?}", config.output.format);
    if let Some(summary) = &config.output.summary_path {
        println!("  Summary: {}", summary);
    }
}

fn budget_label(max_products: usize) -> String {
    if max_products == 0 {
        "unlimited".to_string()
    } else {
        max_products.to_string()
    }
}

/// Runs the configured scrapes in order
///
/// In `both` mode the static scrape gets half of the product budget and the
/// dynamic scrape the rest.
async fn handle_scrape(
    config: &Config,
    cancel: CancellationToken,
) -> anyhow::Result<Vec<ScrapeOutcome>> {
    let start = parse_start_url(&config.scrape.start_url)
        .with_context(|| format!("invalid start URL '{}'", config.scrape.start_url))?;
    let extractor = build_extractor(config, &start)?;
    let budget = config.scrape.max_products;

    let plan: Vec<(ScrapeMode, usize)> = match config.scrape.mode {
        ScrapeMode::Both => {
            let half = budget / 2;
            vec![(ScrapeMode::Static, half), (ScrapeMode::Dynamic, budget - half)]
        }
        mode => vec![(mode, budget)],
    };

    let mut outcomes = Vec::with_capacity(plan.len());
    for (mode, max_products) in plan {
        // 0 stays unlimited, but an odd budget of 1 must not become unlimited
        if budget > 0 && max_products == 0 {
            continue;
        }
        if cancel.is_cancelled() {
            break;
        }

        let fetch_mode = match mode {
            ScrapeMode::Dynamic => {
                FetchMode::Dynamic(Box::new(HttpBrowserDriver::new(config.http.clone())))
            }
            _ => FetchMode::Static(Box::new(
                HttpFetcher::new(&config.http).context("failed to build HTTP client")?,
            )),
        };

        let request = ScrapeRequest {
            start: PageRef::Url(start.clone()),
            mode: fetch_mode,
            max_products,
            retry_policy: config.retry.to_policy(),
            guard: PaginationGuard::new(config.scrape.max_pages),
            rotator: FingerprintRotator::from_config(&config.fingerprints)?,
        };

        let outcome = run_scrape(request, extractor.as_ref(), cancel.clone())
            .await
            .context("scrape could not start")?;
        outcomes.push(outcome);
    }

    Ok(outcomes)
}

fn build_extractor(config: &Config, start: &Url) -> anyhow::Result<Box<dyn ItemExtractor>> {
    match config.extract.template {
        ExtractTemplate::Catalog => {
            let template = CatalogTemplate::from_config(&config.extract.selectors)?;
            Ok(Box::new(template))
        }
        ExtractTemplate::NextData => {
            let base = match &config.extract.product_base_url {
                Some(base) => Url::parse(base)
                    .with_context(|| format!("invalid product base URL '{}'", base))?,
                None => start.clone(),
            };
            Ok(Box::new(NextDataExtractor::new(Some(base))))
        }
    }
}
