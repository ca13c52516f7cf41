//! Command-line interface definitions for Awful Headline Sentiment.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Credentials can be provided via command-line flags or environment variables.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{DEFAULT_CLEAN_OUTPUT, DEFAULT_INPUT, DEFAULT_OUTPUT, SearchEngine};

/// Command-line arguments for the Awful Headline Sentiment application.
///
/// # Examples
///
/// ```sh
/// # Annotate every title in Dataset_3k.csv, resuming from web_sentiment_analysis.csv
/// NLU_API_KEY=... NLU_URL=https://... awful_headline_sentiment analyze
///
/// # Drop sentinel rows and split the emotion column
/// awful_headline_sentiment clean -i web_sentiment_analysis.csv -o cleaned.csv
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve, extract, and annotate every title not yet in the output file
    Analyze(AnalyzeArgs),
    /// Drop sentinel rows and split the emotion summary into numeric columns
    Clean(CleanArgs),
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Input CSV with a `title` column
    #[arg(short, long, default_value = DEFAULT_INPUT)]
    pub input: PathBuf,

    /// Output CSV; also the checkpoint used to resume
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Optional path to a settings YAML file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Rows to buffer between checkpoint flushes
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// NLU service API key
    #[arg(long, env = "NLU_API_KEY", hide_env_values = true)]
    pub nlu_api_key: Option<String>,

    /// NLU service instance URL
    #[arg(long, env = "NLU_URL")]
    pub nlu_url: Option<String>,

    /// Web search backend used to resolve titles
    #[arg(long, value_enum)]
    pub search_engine: Option<SearchEngine>,

    /// Pause before each search request, in milliseconds
    #[arg(long)]
    pub search_pause_ms: Option<u64>,
}

#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Annotated CSV produced by `analyze`
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub input: PathBuf,

    /// Destination for the cleaned CSV
    #[arg(short, long, default_value = DEFAULT_CLEAN_OUTPUT)]
    pub output: PathBuf,
}
