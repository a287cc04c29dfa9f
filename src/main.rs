//! Catalog-Ripple main entry point
//!
//! This is the command-line interface for the Catalog-Ripple product crawler.

use catalog_ripple::config::{load_config_with_hash, Config};
use catalog_ripple::crawler::run_crawl;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Catalog-Ripple: a product catalog crawler with variant discovery
///
/// Catalog-Ripple walks the listing pages of each configured category,
/// extracts product details and follows every sibling variant it finds,
/// fetching each product identifier at most once per run.
#[derive(Parser, Debug)]
#[command(name = "catalog-ripple")]
#[command(version = "1.0.0")]
#[command(about = "A product catalog crawler with variant discovery", long_about = None)]
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

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
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
    } else {
        handle_crawl(&config, &config_hash).await?;
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

fn describe_limit<T: std::fmt::Display>(limit: Option<T>) -> String {
    limit
        .map(|value| value.to_string())
        .unwrap_or_else(|| "unlimited".to_string())
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Catalog-Ripple Dry Run ===\n");

    println!("Crawler Configuration:");
    println!(
        "  Max concurrent fetches: {}",
        config.crawler.max_concurrent_fetches
    );
    println!("  Max retries: {}", config.crawler.max_retries);
    println!("  Retry backoff: {}ms", config.crawler.retry_backoff_ms);
    println!("  Fetch timeout: {}ms", config.crawler.fetch_timeout_ms);
    println!(
        "  Max claimed identifiers: {}",
        describe_limit(config.crawler.max_claimed_identifiers)
    );
    println!(
        "  Max listing pages: {}",
        describe_limit(config.crawler.max_listing_pages)
    );
    println!(
        "  Max side requests per page: {}",
        config.crawler.max_side_requests
    );

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nCategories ({}):", config.categories.len());
    for entry in &config.categories {
        println!("  - {}: {}", entry.name, entry.seed);
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start crawling with {} listing seeds",
        config.categories.len()
    );
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use catalog_ripple::output::{load_statistics, print_statistics};
    use catalog_ripple::storage::SqliteStorage;
    use std::path::Path;

    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, config_hash: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Categories: {}", config.categories.len());

    match run_crawl(config, config_hash).await {
        Ok(report) => {
            tracing::info!(
                run_id = report.run_id,
                records = report.records_stored,
                storage_failures = report.storage_failures,
                fetches = report.fetch_attempts,
                retries = report.retries,
                dropped = report.dropped,
                identifiers = report.identifiers_claimed,
                "Crawl finished"
            );
            if report.discovery_halted {
                tracing::warn!("Identifier limit reached; variant discovery was halted");
            }
            if report.interrupted {
                tracing::warn!("Crawl was interrupted before the frontier drained");
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
