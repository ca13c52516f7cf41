//! # Awful Headline Sentiment
//!
//! A resumable batch pipeline that turns a list of article titles into a
//! dataset of sentiment, emotion, category, concept, and entity annotations.
//!
//! ## Usage
//!
//! ```sh
//! NLU_API_KEY=... NLU_URL=https://... awful_headline_sentiment analyze -i Dataset_3k.csv
//! awful_headline_sentiment clean
//! ```
//!
//! ## Architecture
//!
//! The `analyze` command runs each title through a fixed sequence:
//! 1. **Resolving**: Search the web for the title and take the first hit
//! 2. **Extracting**: Download the page and keep its article text
//! 3. **Annotating**: Send the text to the NLU service
//! 4. **Recording**: Buffer the row and flush every `batch_size` rows
//!
//! The output CSV doubles as the checkpoint: titles already in it are
//! skipped, so an interrupted run picks up where it left off. The `clean`
//! command post-processes a finished output file.

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod annotator;
mod batch;
mod checkpoint;
mod clean;
mod cli;
mod config;
mod dataset;
mod extractor;
mod models;
mod pipeline;
mod resolver;
mod utils;

use annotator::{Annotator, RetryNlu, WatsonNlu};
use checkpoint::CheckpointStore;
use cli::{AnalyzeArgs, CleanArgs, Cli, Command};
use config::Settings;
use extractor::HtmlArticleExtractor;
use pipeline::Pipeline;
use resolver::WebSearchResolver;
use utils::ensure_parent_dir;

const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; awful_headline_sentiment/",
    env!("CARGO_PKG_VERSION"),
    ")"
);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    debug!(?args.command, "Parsed CLI arguments");

    match args.command {
        Command::Analyze(args) => run_analyze(args).await?,
        Command::Clean(args) => run_clean(args).await?,
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

#[instrument(level = "info", skip_all, fields(input = %args.input.display(), output = %args.output.display()))]
async fn run_analyze(args: AnalyzeArgs) -> Result<(), Box<dyn Error>> {
    // Fatal checks come first: nothing is processed on a bad dataset or config.
    let titles = dataset::load_titles(&args.input).await.inspect_err(|e| {
        error!(error = %e, "Cannot process input dataset");
    })?;

    let mut settings = Settings::load(args.config.as_deref()).await?;
    settings.apply_args(&args);
    settings.validate().inspect_err(|e| {
        error!(error = %e, "Invalid configuration");
    })?;
    debug!(?settings, "Resolved settings");

    if let Err(e) = ensure_parent_dir(&args.output).await {
        error!(error = %e, "Output directory is not writable");
        return Err(e);
    }

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(settings.request_timeout())
        .build()?;

    let nlu = WatsonNlu::new(client.clone(), &settings.nlu)?;
    let nlu = RetryNlu::new(
        nlu,
        settings.nlu.max_retries,
        Duration::from_millis(settings.nlu.retry_base_delay_ms),
    );
    let pipeline = Pipeline::new(
        WebSearchResolver::new(client.clone(), &settings.search),
        HtmlArticleExtractor::new(client),
        Annotator::new(nlu),
    );

    let store = CheckpointStore::new(&args.output);
    let summary = pipeline.run(&titles, store, settings.batch_size).await?;
    info!(
        processed = summary.processed,
        skipped = summary.skipped,
        path = %args.output.display(),
        "Annotation run finished"
    );
    Ok(())
}

#[instrument(level = "info", skip_all)]
async fn run_clean(args: CleanArgs) -> Result<(), Box<dyn Error>> {
    let stats = clean::clean_file(&args.input, &args.output).await?;
    info!(
        kept = stats.kept,
        dropped = stats.dropped,
        path = %args.output.display(),
        "Clean pass finished"
    );
    Ok(())
}
