//! mailsift-analyze - classify a batch of scraped emails
//!
//! Reads a JSON array of scraped emails, runs them through the
//! classification gateway in paced groups, and persists every result in
//! the aggregation store.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mailsift_core::db::run_legacy_import;
use mailsift_core::{
    BatchAnalyzer, BatchOutcome, ClassificationGateway, Config, Database, EmailData,
};

#[derive(Parser)]
#[command(name = "mailsift-analyze")]
#[command(about = "Classify a batch of scraped emails")]
#[command(version)]
struct Args {
    /// JSON file containing an array of scraped emails
    input: PathBuf,

    /// Override the configured group size
    #[arg(long)]
    batch_size: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard =
        mailsift_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let content = std::fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let emails: Vec<EmailData> =
        serde_json::from_str(&content).context("input is not a JSON array of scraped emails")?;

    if emails.is_empty() {
        println!("Nothing to analyze.");
        return Ok(());
    }

    let db = Database::open(&Config::database_path()).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;
    let db = Arc::new(db);

    run_legacy_import(&db, &Config::legacy_analyses_path())
        .context("failed to import legacy analyses")?;

    let gateway = ClassificationGateway::new(&config.gateway)
        .context("failed to build classification gateway")?;
    tracing::info!(
        viable_providers = gateway.viable_provider_count(),
        emails = emails.len(),
        "Starting batch analysis"
    );

    let mut batch = config.batch.clone();
    if let Some(size) = args.batch_size {
        batch.size = size;
    }

    let analyzer = BatchAnalyzer::new(Arc::new(gateway), Arc::clone(&db), &batch);

    println!("Analyzing {} email(s)...", emails.len());

    match analyzer.analyze_batch(&emails).await? {
        BatchOutcome::Completed(report) => {
            println!(
                "Classified {}/{} email(s), {} failed.",
                report.completed, report.requested, report.failed
            );
            if report.quota_exhausted {
                println!(
                    "Provider quota exhausted; the run stopped early and kept partial results."
                );
            }
            println!("Run 'mailsift stats' to see the updated dashboard.");
        }
        BatchOutcome::Skipped => {
            println!("A batch analysis is already running; nothing was started.");
        }
    }

    Ok(())
}
