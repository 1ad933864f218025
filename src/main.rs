use chrono::Utc;
use clap::Parser;
use secfeed::classification::ClassificationEngine;
use secfeed::cli::Cli;
use secfeed::config::Config;
use secfeed::enrich::{Enricher, HttpPageFetcher};
use secfeed::feed::{FeedFetcher, HttpFeedReader};
use secfeed::llm::retry::Retry;
use secfeed::llm::{LlmClient, LlmProvider};
use secfeed::outputs::Reporter;
use secfeed::pipeline::Pipeline;
use secfeed::signal;
use secfeed::summary::Summarizer;
use std::error::Error;
use std::fs::OpenOptions;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

fn init_tracing(args: &Cli) -> Result<(), Box<dyn Error>> {
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let writer = match &args.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            BoxMakeWriter::new(std::io::stdout.and(Arc::new(file)))
        }
        None => BoxMakeWriter::new(std::io::stdout),
    };

    tfmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(args.log_file.is_none())
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();
    init_tracing(&args)?;

    let start_time = Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "secfeed starting up");
    debug!(config = %args.config.display(), log_file = ?args.log_file, "Parsed CLI arguments");

    let shutdown = signal::install();
    let config = Config::load(&args.config)?;

    let client = LlmClient::from_config(&config.llm).await?;
    info!(client = client.name(), max_retries = config.llm.max_retries, "Using LLM provider");
    let provider = Retry::new(client, config.llm.max_retries, RETRY_BASE_DELAY);

    let engine =
        ClassificationEngine::new(&config.llm.classification, &config.categories, &provider)
            .await?;
    let reporter = Reporter::from_config(&config.reporting)?;

    let init_from = Utc::now() - chrono::Duration::days(i64::from(config.init_pull));
    let enricher = Enricher::new(HttpPageFetcher::new()?, config.enrichment.always_fetch);
    let fetcher = FeedFetcher::new(
        HttpFeedReader::new()?,
        enricher,
        config.rss_feed.clone(),
        init_from,
        Duration::from_secs(config.poll_interval_minutes * 60),
    );
    info!(
        feeds = config.rss_feed.len(),
        %init_from,
        interval_minutes = config.poll_interval_minutes,
        "Starting feed polling"
    );

    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let poller = tokio::spawn(fetcher.run(tx, shutdown.clone()));

    let pipeline = Pipeline::new(
        provider,
        engine,
        Summarizer::new(&config.llm.summary.model),
        reporter,
    );
    let stats = pipeline.run(rx, shutdown).await;

    if let Err(e) = poller.await {
        error!(error = %e, "Feed polling task failed");
    }

    info!(
        received = stats.received,
        matched = stats.matched,
        total_cost_usd = pipeline.provider().total_cost(),
        elapsed_s = start_time.elapsed().as_secs(),
        "Shutting down secfeed"
    );
    Ok(())
}
