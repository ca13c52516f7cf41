//! The resumable per-title pipeline.
//!
//! For every title not already in the checkpoint store:
//!
//! ```text
//! Resolving ──NotFound──────────────────────────────▶ "No URL Found" row
//!     │ Found(url)
//! Extracting ──NotExtractable───────────────────────▶ "No Text" row
//!     │ Text(body)
//! Annotating ──▶ real row | "Neutral"/None row | "Error" row
//! ```
//!
//! Exactly one row is recorded per non-skipped title. Titles are handled
//! strictly one after another; rows reach the store through a
//! [`BatchWriter`] in input order.
//!
//! The resume set is loaded once before the loop and never refreshed, so a
//! title repeated within one input file is processed once per occurrence
//! until a later run finds it checkpointed.

use std::collections::BTreeMap;
use std::error::Error;
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::annotator::{Annotator, NluService};
use crate::batch::BatchWriter;
use crate::checkpoint::CheckpointStore;
use crate::extractor::Extractor;
use crate::models::{Annotation, AnnotationResult, Extraction, Resolution};
use crate::resolver::Resolver;

/// Counts reported at the end of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub processed: usize,
    pub skipped: usize,
    pub flushes: usize,
    /// Rows recorded this run, keyed by `sentiment_label`.
    pub labels: BTreeMap<String, usize>,
}

/// Drives titles through resolve → extract → annotate.
#[derive(Debug)]
pub struct Pipeline<R, E, S> {
    resolver: R,
    extractor: E,
    annotator: Annotator<S>,
}

impl<R, E, S> Pipeline<R, E, S>
where
    R: Resolver,
    E: Extractor,
    S: NluService,
{
    pub fn new(resolver: R, extractor: E, annotator: Annotator<S>) -> Self {
        Self {
            resolver,
            extractor,
            annotator,
        }
    }

    /// Carry one title through every stage and build its row.
    #[instrument(level = "info", skip_all, fields(%title))]
    pub async fn process_title(&self, title: &str) -> AnnotationResult {
        info!("Searching for article");

        let annotation = match self.resolver.resolve(title).await {
            Resolution::NotFound => {
                warn!("No URL found");
                Annotation::no_url()
            }
            Resolution::Found(url) => match self.extractor.extract(&url).await {
                Extraction::NotExtractable => Annotation::no_text(),
                Extraction::Text(text) => self.annotator.annotate(&text).await,
            },
        };

        AnnotationResult::new(title, annotation)
    }

    /// Process every title not yet in `store`, flushing every `batch_size` rows.
    ///
    /// # Errors
    ///
    /// Only the final flush can fail the run. Earlier flush failures are
    /// logged and the rows stay buffered for the next attempt.
    #[instrument(level = "info", skip_all, fields(titles = titles.len(), batch_size = batch_size))]
    pub async fn run(
        &self,
        titles: &[String],
        store: CheckpointStore,
        batch_size: usize,
    ) -> Result<RunSummary, Box<dyn Error>> {
        let t0 = Instant::now();
        let processed_titles = store.load_titles().await;
        let mut writer = BatchWriter::new(store, batch_size);
        let mut summary = RunSummary {
            total: titles.len(),
            ..RunSummary::default()
        };

        for title in titles {
            if processed_titles.contains(title) {
                info!(%title, "Skipping (already processed)");
                summary.skipped += 1;
                continue;
            }

            let row = self.process_title(title).await;
            summary.processed += 1;
            *summary.labels.entry(row.sentiment_label.clone()).or_default() += 1;

            if let Err(e) = writer.push(row).await {
                warn!(
                    error = %e,
                    pending = writer.pending(),
                    "Checkpoint flush failed; rows kept for the next attempt"
                );
            }
        }

        let stats = writer.finish().await?;
        summary.flushes = stats.flushes;

        let elapsed = t0.elapsed();
        info!(
            total = summary.total,
            processed = summary.processed,
            skipped = summary.skipped,
            flushes = summary.flushes,
            labels = ?summary.labels,
            secs = elapsed.as_secs(),
            "Batch processing completed"
        );
        Ok(summary)
    }
}
