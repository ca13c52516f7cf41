//! Text annotation through a natural-language-understanding service.
//!
//! # Architecture
//!
//! The module uses a trait-based design:
//! - [`NluService`]: Core trait, one `analyze` call per text
//! - [`WatsonNlu`]: IBM Watson NLU-compatible REST client
//! - [`RetryNlu`]: Decorator that adds exponential backoff to any `NluService`
//! - [`Annotator`]: Turns service outcomes into [`Annotation`] fragments
//!
//! # Annotation outcomes
//!
//! | Input | Service | Fragment |
//! |-------|---------|----------|
//! | blank text | not called | `Neutral`, 0, `None` everywhere |
//! | text | success | real labels and scores |
//! | text | any error | `Error`, 0, `Error` everywhere |

use rand::{Rng, rng};
use reqwest::Client;
use std::error::Error;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};
use url::Url;

use crate::config::NluSettings;
use crate::models::{AnalyzeRequest, Annotation, Features, NONE_VALUE, NluResponse};
use crate::utils::{join_or_none, truncate_for_log, upcase};

/// A text-understanding backend.
pub trait NluService {
    /// Analyze `text` for sentiment, categories, concepts, emotion, and entities.
    async fn analyze(&self, text: &str) -> Result<NluResponse, Box<dyn Error>>;
}

/// Client for the Watson NLU `v1/analyze` endpoint.
///
/// Built once at start-up and handed to the [`Annotator`].
#[derive(Clone)]
pub struct WatsonNlu {
    client: Client,
    endpoint: Url,
    api_key: String,
    version: String,
}

impl fmt::Debug for WatsonNlu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatsonNlu")
            .field("endpoint", &self.endpoint.as_str())
            .field("version", &self.version)
            .finish()
    }
}

impl WatsonNlu {
    /// # Errors
    ///
    /// Returns an error if the API key or service URL is missing, or the URL
    /// does not parse.
    pub fn new(client: Client, settings: &NluSettings) -> Result<Self, Box<dyn Error>> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or("missing NLU API key")?;
        let service_url = settings
            .service_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or("missing NLU service URL")?;
        let endpoint = Url::parse(&format!("{}/v1/analyze", service_url.trim_end_matches('/')))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            version: settings.version.clone(),
        })
    }
}

impl NluService for WatsonNlu {
    #[instrument(level = "info", skip_all, fields(text_bytes = text.len()))]
    async fn analyze(&self, text: &str) -> Result<NluResponse, Box<dyn Error>> {
        let t0 = Instant::now();
        let body = AnalyzeRequest {
            text,
            features: Features::default(),
        };
        let resp = self
            .client
            .post(self.endpoint.clone())
            .query(&[("version", self.version.as_str())])
            .basic_auth("apikey", Some(&self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let raw = resp.text().await?;
        let dt = t0.elapsed();
        if !status.is_success() {
            warn!(elapsed_ms = dt.as_millis(), %status, "NLU call failed");
            return Err(format!("NLU returned HTTP {status}: {}", truncate_for_log(&raw, 300)).into());
        }

        serde_json::from_str::<NluResponse>(&raw).map_err(|e| {
            warn!(
                error = %e,
                response_preview = %truncate_for_log(&raw, 300),
                "NLU returned an unexpected response"
            );
            e.into()
        })
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`NluService`].
///
/// # Backoff Strategy
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
///
/// With `max_retries = 0` the inner service is called exactly once.
pub struct RetryNlu<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T> RetryNlu<T>
where
    T: NluService,
{
    /// Wrap `inner` with retry behavior.
    ///
    /// # Arguments
    ///
    /// * `inner` - The service to retry
    /// * `max_retries` - Extra attempts after the first failure
    /// * `base_delay` - Delay before the first retry, doubled on each later one
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let nlu = RetryNlu::new(WatsonNlu::new(client, &settings)?, 3, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryNlu<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryNlu")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> NluService for RetryNlu<T>
where
    T: NluService,
{
    #[instrument(level = "debug", skip_all)]
    async fn analyze(&self, text: &str) -> Result<NluResponse, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.analyze(text).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        if self.max_retries > 0 {
                            error!(
                                attempt,
                                max = self.max_retries,
                                elapsed_ms_total = total_t0.elapsed().as_millis(),
                                error = %e,
                                "analyze() exhausted retries"
                            );
                        }
                        return Err(e);
                    }

                    let shift = u32::try_from(attempt - 1).unwrap_or(u32::MAX).min(16);
                    let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + Duration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        ?delay,
                        error = %e,
                        "analyze() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Produces an [`Annotation`] for every text, whatever the service does.
#[derive(Debug)]
pub struct Annotator<S> {
    service: S,
}

impl<S: NluService> Annotator<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }

    #[cfg(test)]
    pub(crate) fn service(&self) -> &S {
        &self.service
    }

    /// Annotate `text`. Blank text never reaches the service.
    #[instrument(level = "info", skip_all, fields(text_bytes = text.len()))]
    pub async fn annotate(&self, text: &str) -> Annotation {
        if text.trim().is_empty() {
            info!("Blank article text; skipping NLU call");
            return Annotation::empty();
        }

        match self.service.analyze(text).await {
            Ok(resp) => {
                let annotation = annotation_from_response(&resp);
                info!(
                    label = %annotation.sentiment_label,
                    score = annotation.sentiment_score,
                    "Annotated article"
                );
                annotation
            }
            Err(e) => {
                error!(error = %e, "NLU error; recording Error row");
                Annotation::error()
            }
        }
    }
}

/// Flatten a service response into the row-oriented fragment.
///
/// # Arguments
///
/// * `resp` - A successful service response
///
/// # Returns
///
/// An [`Annotation`] with the sentiment label capitalized and list fields
/// joined with `", "`. Empty lists and a blank label become `"None"`.
///
/// # Examples
///
/// ```ignore
/// let a = annotation_from_response(&resp);
/// assert_eq!(a.sentiment_label, "Positive");
/// ```
pub fn annotation_from_response(resp: &NluResponse) -> Annotation {
    let sentiment = &resp.sentiment.document;
    let emotion = resp.emotion.document.emotion.summary();
    let label = sentiment.label.trim();

    Annotation {
        sentiment_label: if label.is_empty() { NONE_VALUE.to_string() } else { upcase(label) },
        sentiment_score: sentiment.score,
        categories: join_or_none(resp.categories.iter().map(|c| &c.label)),
        concepts: join_or_none(resp.concepts.iter().map(|c| &c.text)),
        emotion: if emotion.is_empty() { NONE_VALUE.to_string() } else { emotion },
        entities: join_or_none(resp.entities.iter().map(|e| &e.text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const FULL_RESPONSE: &str = r#"{
        "sentiment": {"document": {"label": "positive", "score": 0.87}},
        "categories": [
            {"label": "/news/politics", "score": 0.9},
            {"label": "/law, govt and politics", "score": 0.5}
        ],
        "concepts": [{"text": "Election", "relevance": 0.9}],
        "emotion": {"document": {"emotion": {
            "joy": 0.4, "sadness": 0.1, "anger": 0.05, "fear": 0.02, "disgust": 0.01
        }}},
        "entities": [
            {"type": "Person", "text": "Jane Doe"},
            {"type": "Location", "text": "Ohio"}
        ]
    }"#;

    fn full_response() -> NluResponse {
        serde_json::from_str(FULL_RESPONSE).unwrap()
    }

    /// Fails `failures` times, then succeeds.
    struct FlakyNlu {
        failures: usize,
        calls: Cell<usize>,
    }

    impl NluService for FlakyNlu {
        async fn analyze(&self, _text: &str) -> Result<NluResponse, Box<dyn Error>> {
            let n = self.calls.get() + 1;
            self.calls.set(n);
            if n <= self.failures {
                Err("quota exceeded".into())
            } else {
                Ok(full_response())
            }
        }
    }

    #[test]
    fn test_annotation_from_response() {
        let a = annotation_from_response(&full_response());
        assert_eq!(a.sentiment_label, "Positive");
        assert_eq!(a.sentiment_score, 0.87);
        assert_eq!(a.categories, "/news/politics, /law, govt and politics");
        assert_eq!(a.concepts, "Election");
        assert_eq!(
            a.emotion,
            "Joy: 0.40, Sadness: 0.10, Anger: 0.05, Fear: 0.02, Disgust: 0.01"
        );
        assert_eq!(a.entities, "Jane Doe, Ohio");
    }

    #[test]
    fn test_empty_lists_become_none() {
        let mut resp = full_response();
        resp.categories.clear();
        resp.concepts.clear();
        resp.entities.clear();
        let a = annotation_from_response(&resp);
        assert_eq!(a.categories, "None");
        assert_eq!(a.concepts, "None");
        assert_eq!(a.entities, "None");
    }

    #[test]
    fn test_blank_label_becomes_none() {
        let mut resp = full_response();
        resp.sentiment.document.label = "  ".into();
        let a = annotation_from_response(&resp);
        assert_eq!(a.sentiment_label, "None");
        assert_eq!(a.sentiment_score, 0.87);
    }

    #[tokio::test]
    async fn test_blank_text_skips_service() {
        let annotator = Annotator::new(FlakyNlu { failures: 0, calls: Cell::new(0) });
        let a = annotator.annotate("  \n\t ").await;
        assert_eq!(a, Annotation::empty());
        assert_eq!(annotator.service.calls.get(), 0);
    }

    #[tokio::test]
    async fn test_service_error_becomes_error_fragment() {
        let annotator = Annotator::new(FlakyNlu { failures: 1, calls: Cell::new(0) });
        let a = annotator.annotate("Some article text.").await;
        assert_eq!(a, Annotation::error());
        assert_eq!(annotator.service.calls.get(), 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failures() {
        let flaky = FlakyNlu { failures: 2, calls: Cell::new(0) };
        let retry = RetryNlu::new(flaky, 3, Duration::ZERO);
        assert!(retry.analyze("text").await.is_ok());
        assert_eq!(retry.inner.calls.get(), 3);
    }

    #[tokio::test]
    async fn test_zero_retries_is_single_attempt() {
        let flaky = FlakyNlu { failures: 5, calls: Cell::new(0) };
        let retry = RetryNlu::new(flaky, 0, Duration::ZERO);
        assert!(retry.analyze("text").await.is_err());
        assert_eq!(retry.inner.calls.get(), 1);
    }

    #[test]
    fn test_watson_requires_credentials() {
        let settings = NluSettings::default();
        assert!(WatsonNlu::new(Client::new(), &settings).is_err());
    }

    #[test]
    fn test_watson_endpoint() {
        let settings = NluSettings {
            api_key: Some("secret-key".into()),
            service_url: Some("https://nlu.example/instances/abc/".into()),
            ..NluSettings::default()
        };
        let nlu = WatsonNlu::new(Client::new(), &settings).unwrap();
        assert_eq!(nlu.endpoint.as_str(), "https://nlu.example/instances/abc/v1/analyze");
        assert!(!format!("{nlu:?}").contains("secret-key"));
    }
}
