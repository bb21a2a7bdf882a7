mod export;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use scout_client::{ReqwestTransport, ScraperExtractor, WhatlangDetector};
use scout_core::config::DEFAULT_CONFIG_PATH;
use scout_core::{CrawlConfig, CrawlOutcome, CrawlService, IdentityRotator, TracingCrawlReporter};
use scout_db::{Database, DatabaseConfig};

#[derive(Parser)]
#[command(name = "scout", version, about = "Job listing crawler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl search results, filter them, and store new postings
    Crawl {
        /// Path to the JSON config file
        #[arg(env = "SCOUT_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Rotate the VPN identity before crawling; abort if it does not change
        #[arg(long, default_value_t = false)]
        reset_identity: bool,
    },

    /// Rotate the VPN identity and report whether the public IP changed
    ResetIdentity {
        /// Path to the JSON config file
        #[arg(env = "SCOUT_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("scout=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl {
            config,
            reset_identity,
        } => cmd_crawl(&config, reset_identity).await?,
        Commands::ResetIdentity { config } => cmd_reset_identity(&config).await?,
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<CrawlConfig> {
    CrawlConfig::load(path).with_context(|| format!("Failed to load config {}", path.display()))
}

/// Open the job database: `DATABASE_URL` when set, otherwise `db_path`.
async fn connect_db(config: &CrawlConfig) -> Result<Database> {
    if std::env::var_os("DATABASE_URL").is_none()
        && let Some(parent) = config.db_path.parent().filter(|p| !p.as_os_str().is_empty())
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let db_config = DatabaseConfig::from_env_or_file(&config.db_path)?;
    match Database::connect(&db_config).await {
        Ok(db) => Ok(db),
        Err(e) => {
            tracing::error!(error = %e, "Database unavailable");
            Err(e).context("Failed to connect to database")
        }
    }
}

/// Control traffic goes direct, never through the crawl proxies.
async fn rotate_identity(config: &CrawlConfig) -> Result<bool> {
    let transport = ReqwestTransport::with_proxies(&[], config.fetch.request_timeout())
        .context("Failed to create HTTP client")?;
    let rotator = IdentityRotator::new(transport, config.identity.clone(), TracingCrawlReporter);
    Ok(rotator.reset_identity().await)
}

async fn cmd_reset_identity(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    if !rotate_identity(&config).await? {
        bail!("Identity did not change");
    }
    println!("Identity changed");
    Ok(())
}

async fn cmd_crawl(config_path: &Path, reset_identity: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let db = connect_db(&config).await?;

    if reset_identity && !rotate_identity(&config).await? {
        bail!("Identity reset failed, aborting crawl");
    }

    let transport = ReqwestTransport::with_proxies(&config.proxies, config.fetch.request_timeout())
        .context("Failed to create HTTP client")?;
    tracing::info!(routes = transport.routes(), "HTTP transport ready");
    let export = config.export.clone();
    let extractor = match &config.salary_pattern {
        Some(pattern) => ScraperExtractor::with_salary_pattern(pattern)?,
        None => ScraperExtractor::new(),
    };

    let service = CrawlService::new(
        transport,
        extractor,
        WhatlangDetector::new(),
        db.job_repo(),
        config,
        TracingCrawlReporter,
    )?;

    let outcome = service.run().await.context("Crawl failed")?;

    if export.enabled {
        export_outcome(&outcome, &export.accepted_csv, &export.filtered_csv)?;
    }

    println!(
        "run {}: {} cards, {} new, {} accepted, {} filtered in {:.1}s",
        outcome.run_id,
        outcome.cards,
        outcome.new_jobs,
        outcome.accepted.len(),
        outcome.filtered.len(),
        outcome.elapsed.as_secs_f64()
    );

    Ok(())
}

fn export_outcome(outcome: &CrawlOutcome, accepted: &Path, filtered: &Path) -> Result<()> {
    for (path, jobs) in [(accepted, &outcome.accepted), (filtered, &outcome.filtered)] {
        if jobs.is_empty() {
            continue;
        }
        let written = export::append_csv(path, jobs, outcome.loaded_at)?;
        tracing::info!(path = %path.display(), rows = written, "Exported CSV");
    }
    Ok(())
}
