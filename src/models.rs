//! Data models for titles, stage outcomes, and annotation rows.
//!
//! This module defines the core data structures used throughout the application:
//! - [`AnnotationResult`]: One row of the checkpoint CSV
//! - [`Annotation`]: The per-title annotation fragment, real or sentinel
//! - [`Resolution`] / [`Extraction`]: Tagged outcomes of the resolve and extract stages
//! - [`NluResponse`] and friends: The subset of the NLU service response we read
//!
//! Missing data is never represented by an empty field. Every failure branch
//! maps to a fixed sentinel string so downstream consumers can filter on
//! field content alone.

use serde::{Deserialize, Serialize};
use url::Url;

/// Placeholder for list fields when the service returned nothing.
pub const NONE_VALUE: &str = "None";
/// Label and field value written when the annotation service failed.
pub const ERROR_VALUE: &str = "Error";
/// Label and field value written when the article body could not be extracted.
pub const NO_TEXT_VALUE: &str = "No Text";
/// Label written when no URL could be resolved for a title.
pub const NO_URL_LABEL: &str = "No URL Found";
/// Field value written when no URL could be resolved for a title.
pub const NO_URL_VALUE: &str = "No URL";

/// Outcome of looking a title up on the web.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The first search hit.
    Found(Url),
    /// No hit, or the lookup itself failed.
    NotFound,
}

/// Outcome of pulling article text from a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Plain article text. May be empty or whitespace-only.
    Text(String),
    /// Fetch or parse failed.
    NotExtractable,
}

/// The annotation part of a result row, without the title.
///
/// Constructed either from a successful service response or through one of
/// the sentinel constructors. Every field is always non-empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub sentiment_label: String,
    pub sentiment_score: f64,
    pub categories: String,
    pub concepts: String,
    pub emotion: String,
    pub entities: String,
}

impl Annotation {
    fn filled(label: &str, value: &str) -> Self {
        Self {
            sentiment_label: label.to_string(),
            sentiment_score: 0.0,
            categories: value.to_string(),
            concepts: value.to_string(),
            emotion: value.to_string(),
            entities: value.to_string(),
        }
    }

    /// Blank article text: neutral, nothing to report.
    pub fn empty() -> Self {
        Self::filled("Neutral", NONE_VALUE)
    }

    /// The annotation service failed.
    pub fn error() -> Self {
        Self::filled(ERROR_VALUE, ERROR_VALUE)
    }

    /// The article body could not be extracted.
    pub fn no_text() -> Self {
        Self::filled(NO_TEXT_VALUE, NO_TEXT_VALUE)
    }

    /// No URL was found for the title.
    pub fn no_url() -> Self {
        Self::filled(NO_URL_LABEL, NO_URL_VALUE)
    }
}

/// One row of the checkpoint CSV.
///
/// The `csv` serializer derives the header from the field names, so field
/// order here is column order in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationResult {
    pub title: String,
    pub sentiment_label: String,
    pub sentiment_score: f64,
    pub categories: String,
    pub concepts: String,
    pub emotion: String,
    pub entities: String,
}

impl AnnotationResult {
    pub fn new(title: impl Into<String>, annotation: Annotation) -> Self {
        Self {
            title: title.into(),
            sentiment_label: annotation.sentiment_label,
            sentiment_score: annotation.sentiment_score,
            categories: annotation.categories,
            concepts: annotation.concepts,
            emotion: annotation.emotion,
            entities: annotation.entities,
        }
    }
}

/// Request body for the NLU `analyze` endpoint.
#[derive(Debug, Serialize)]
pub struct AnalyzeRequest<'a> {
    pub text: &'a str,
    pub features: Features,
}

/// Features requested from the NLU service.
#[derive(Debug, Serialize)]
pub struct Features {
    pub sentiment: Empty,
    pub categories: Limit,
    pub concepts: Limit,
    pub emotion: Empty,
    pub entities: Limit,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            sentiment: Empty {},
            categories: Limit { limit: 3 },
            concepts: Limit { limit: 3 },
            emotion: Empty {},
            entities: Limit { limit: 5 },
        }
    }
}

/// Feature options with no parameters (serializes to `{}`).
#[derive(Debug, Serialize)]
pub struct Empty {}

/// Feature options carrying a result count limit.
#[derive(Debug, Serialize)]
pub struct Limit {
    pub limit: u32,
}

/// The parts of the NLU `analyze` response the annotator reads.
///
/// Sentiment and emotion are required; a response without them fails to
/// deserialize and is treated as a service error.
#[derive(Debug, Deserialize)]
pub struct NluResponse {
    pub sentiment: DocumentSentiment,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub concepts: Vec<Concept>,
    pub emotion: DocumentEmotion,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentSentiment {
    pub document: Sentiment,
}

#[derive(Debug, Deserialize)]
pub struct Sentiment {
    pub label: String,
    pub score: f64,
}

#[derive(Debug, Deserialize)]
pub struct Category {
    pub label: String,
}

#[derive(Debug, Deserialize)]
pub struct Concept {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct DocumentEmotion {
    pub document: EmotionDocument,
}

#[derive(Debug, Deserialize)]
pub struct EmotionDocument {
    pub emotion: EmotionScores,
}

/// The five emotion axes reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct EmotionScores {
    pub joy: f64,
    pub sadness: f64,
    pub anger: f64,
    pub fear: f64,
    pub disgust: f64,
}

impl EmotionScores {
    /// Render as `Joy: 0.40, Sadness: 0.10, ...` with two decimals per axis.
    pub fn summary(&self) -> String {
        format!(
            "Joy: {:.2}, Sadness: {:.2}, Anger: {:.2}, Fear: {:.2}, Disgust: {:.2}",
            self.joy, self.sadness, self.anger, self.fear, self.disgust
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct Entity {
    pub text: String,
}
