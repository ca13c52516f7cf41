//! Runtime settings for the analyze pipeline.
//!
//! Settings come from three layers, highest precedence first:
//! 1. CLI flags and environment variables (see [`crate::cli`])
//! 2. An optional YAML file passed with `--config`
//! 3. Built-in defaults
//!
//! # Example YAML
//!
//! ```yaml
//! batch_size: 10
//! request_timeout_secs: 30
//! nlu:
//!   api_key: "..."
//!   service_url: "https://api.us-south.natural-language-understanding.watson.cloud.ibm.com/instances/..."
//!   version: "2021-08-01"
//! search:
//!   engine: bing
//!   pause_ms: 2000
//!   # endpoint: "https://www.bing.com/search"
//! ```

use clap::ValueEnum;
use serde::Deserialize;
use std::error::Error;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{info, instrument};

use crate::cli::AnalyzeArgs;

/// Default input dataset.
pub const DEFAULT_INPUT: &str = "Dataset_3k.csv";
/// Default checkpoint store.
pub const DEFAULT_OUTPUT: &str = "web_sentiment_analysis.csv";
/// Default output of the clean pass.
pub const DEFAULT_CLEAN_OUTPUT: &str = "cleaned_sentiment_analysis.csv";
/// Rows buffered between checkpoint flushes.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Which web search backend resolves titles to URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SearchEngine {
    /// DuckDuckGo HTML results page.
    #[default]
    #[value(name = "duckduckgo")]
    DuckDuckGo,
    /// Bing RSS results feed.
    Bing,
}

impl SearchEngine {
    /// Public endpoint queried when no override is configured.
    pub fn default_endpoint(self) -> &'static str {
        match self {
            SearchEngine::DuckDuckGo => "https://html.duckduckgo.com/html/",
            SearchEngine::Bing => "https://www.bing.com/search",
        }
    }
}

/// Top-level settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub batch_size: usize,
    pub request_timeout_secs: u64,
    pub nlu: NluSettings,
    pub search: SearchSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            request_timeout_secs: 30,
            nlu: NluSettings::default(),
            search: SearchSettings::default(),
        }
    }
}

/// Connection parameters for the annotation service.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct NluSettings {
    pub api_key: Option<String>,
    pub service_url: Option<String>,
    pub version: String,
    /// Extra attempts after the first failure. Zero means a single attempt.
    pub max_retries: usize,
    pub retry_base_delay_ms: u64,
}

impl Default for NluSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            service_url: None,
            version: "2021-08-01".to_string(),
            max_retries: 0,
            retry_base_delay_ms: 1000,
        }
    }
}

// Keep the API key out of logs.
impl std::fmt::Debug for NluSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NluSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("service_url", &self.service_url)
            .field("version", &self.version)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .finish()
    }
}

/// Title lookup settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub engine: SearchEngine,
    /// Pause before each lookup, in milliseconds.
    pub pause_ms: u64,
    /// Search endpoint override, e.g. a regional mirror. Defaults to the
    /// engine's public endpoint.
    pub endpoint: Option<String>,
}

impl SearchSettings {
    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| self.engine.default_endpoint())
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            engine: SearchEngine::default(),
            pause_ms: 2000,
            endpoint: None,
        }
    }
}

impl Settings {
    /// Load settings from a YAML file, or defaults when no file is given.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&Path>) -> Result<Self, Box<dyn Error>> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path).await?;
        let settings = Self::from_yaml(&raw)?;
        info!(path = %path.display(), "Loaded settings file");
        Ok(settings)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, Box<dyn Error>> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Overlay CLI flags and environment variables.
    pub fn apply_args(&mut self, args: &AnalyzeArgs) {
        if let Some(batch_size) = args.batch_size {
            self.batch_size = batch_size;
        }
        if let Some(key) = &args.nlu_api_key {
            self.nlu.api_key = Some(key.clone());
        }
        if let Some(url) = &args.nlu_url {
            self.nlu.service_url = Some(url.clone());
        }
        if let Some(engine) = args.search_engine {
            self.search.engine = engine;
        }
        if let Some(pause_ms) = args.search_pause_ms {
            self.search.pause_ms = pause_ms;
        }
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), Box<dyn Error>> {
        if self.batch_size == 0 {
            return Err("batch_size must be at least 1".into());
        }
        if self.nlu.api_key.as_deref().is_none_or(str::is_empty) {
            return Err("missing NLU API key (set NLU_API_KEY, --nlu-api-key, or nlu.api_key)".into());
        }
        if self.nlu.service_url.as_deref().is_none_or(str::is_empty) {
            return Err("missing NLU service URL (set NLU_URL, --nlu-url, or nlu.service_url)".into());
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
