//! Feedload - nightly reference data loader

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use feedload_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use feedload_ingest::config::Config;
use feedload_ingest::db::{create_pool, health_check};
use feedload_ingest::feeds::{self, FeedDefinition};
use feedload_ingest::job::{FeedJob, JobSummary};
use feedload_ingest::sink::MySqlSink;
use feedload_ingest::source::{BucketSource, FileSource, LocalSource};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "feedload")]
#[command(author, version, about = "Load reference data feeds into the database")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download feeds and insert them
    Run {
        /// Feed to load (repeatable); all feeds when omitted
        #[arg(short, long = "feed", value_name = "NAME")]
        feeds: Vec<String>,

        /// Read feed files from this directory instead of the bucket
        #[arg(long, value_name = "DIR")]
        local_dir: Option<PathBuf>,

        /// Where rejection logs are written
        #[arg(long, value_name = "DIR")]
        report_dir: Option<PathBuf>,
    },

    /// Validate configuration and database connectivity
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .output(LogOutput::Console)
        .log_file_prefix("feedload")
        .build();

    // Environment variables take precedence
    let log_config = match log_config.clone().merge_env() {
        Ok(merged) => merged,
        Err(e) => {
            eprintln!("Warning: ignoring invalid logging environment: {}", e);
            log_config
        },
    };

    let _guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: failed to initialize logging: {}", e);
            None
        },
    };

    if let Err(e) = execute(cli.command).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn execute(command: Command) -> Result<()> {
    match command {
        Command::Run {
            feeds,
            local_dir,
            report_dir,
        } => run(&feeds, local_dir, report_dir).await,
        Command::Check => check().await,
    }
}

async fn run(names: &[String], local_dir: Option<PathBuf>, report_dir: Option<PathBuf>) -> Result<()> {
    let config = Config::load().context("Invalid configuration")?;
    let definitions = select_feeds(names)?;

    let source: Arc<dyn FileSource> = match local_dir {
        Some(dir) => {
            info!("Reading feeds from {}", dir.display());
            Arc::new(LocalSource::new(dir))
        },
        None => Arc::new(BucketSource::new(config.storage.clone()).await?),
    };

    let pool = create_pool(&config.database)
        .await
        .context("Failed to connect to database")?;
    let sink = Arc::new(MySqlSink::new(pool.clone()));

    let report_dir = report_dir.unwrap_or_else(|| config.load.report_dir.clone());
    let job = FeedJob::new(source, sink, config.load.split_factor, report_dir);

    let result = job.run(&definitions).await;
    pool.close().await;

    print_summary(&result?);
    Ok(())
}

async fn check() -> Result<()> {
    let config = Config::load().context("Invalid configuration")?;
    info!("Configuration: {:?}", config);

    let pool = create_pool(&config.database)
        .await
        .context("Failed to connect to database")?;
    health_check(&pool).await.context("Database health check failed")?;
    pool.close().await;

    BucketSource::new(config.storage.clone()).await?;

    println!("Configuration OK");
    println!("  database: {}:{}/{}", config.database.host, config.database.port, config.database.database);
    println!("  bucket:   {}", config.storage.bucket);
    println!("  split factor: {}", config.load.split_factor);
    Ok(())
}

fn select_feeds(names: &[String]) -> Result<Vec<FeedDefinition>> {
    if names.is_empty() {
        return Ok(feeds::all());
    }

    let mut selected = Vec::with_capacity(names.len());
    for name in names {
        match feeds::by_name(name) {
            Some(definition) => selected.push(definition),
            None => {
                let known: Vec<&str> = feeds::all().iter().map(|f| f.name).collect();
                bail!("Unknown feed '{}' (known feeds: {})", name, known.join(", "));
            },
        }
    }

    Ok(selected)
}

fn print_summary(summary: &JobSummary) {
    println!("Run {}", summary.run_id);
    for report in &summary.reports {
        println!(
            "  {:<8} inserted {:>8}  bad lines {:>6}  failed rows {:>6}",
            report.feed,
            report.inserted,
            report.bad_lines.len(),
            report.failed_rows.len()
        );
    }
    println!(
        "Total: {} inserted, {} rejected",
        summary.total_inserted(),
        summary.total_rejected()
    );
}
