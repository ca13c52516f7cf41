//! Post-processing of a finished checkpoint file.
//!
//! An independent, pure pass over the annotated CSV:
//! 1. Drop every row where any field equals (case-insensitively) `error`,
//!    `no text`, or `no url found`.
//! 2. Split the `emotion` summary into `Joy`, `Sadness`, `Anger`, `Fear`,
//!    and `Disgust` columns; a missing axis reads as `0.0`.
//! 3. Drop the `emotion` column.
//! 4. Strip backslashes from `categories`.
//!
//! The new emotion columns are appended after the remaining input columns.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

use crate::dataset::{DatasetError, column_index, read_bytes};
use crate::utils::ensure_parent_dir;

/// Field values that mark a sentinel row.
pub const BLOCKLIST: [&str; 3] = ["error", "no text", "no url found"];

/// Emotion axes in output column order.
pub const EMOTION_AXES: [&str; 5] = ["Joy", "Sadness", "Anger", "Fear", "Disgust"];

static EMOTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    EMOTION_AXES
        .iter()
        .map(|axis| Regex::new(&format!(r"{axis}:\s([\d.]+)")).expect("valid regex"))
        .collect()
});

/// Counts from a clean pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CleanStats {
    pub kept: usize,
    pub dropped: usize,
}

/// Whether any field is a blocklisted sentinel value.
pub fn is_sentinel_row(record: &csv::StringRecord) -> bool {
    record.iter().any(|field| {
        let field = field.trim();
        BLOCKLIST.iter().any(|b| field.eq_ignore_ascii_case(b))
    })
}

/// Decompose an emotion summary into its five axis values.
///
/// ```ignore
/// let [joy, ..] = parse_emotions("Joy: 0.40, Sadness: 0.10");
/// assert_eq!(joy, 0.40);
/// ```
pub fn parse_emotions(summary: &str) -> [f64; 5] {
    let mut values = [0.0; 5];
    for (value, pattern) in values.iter_mut().zip(EMOTION_PATTERNS.iter()) {
        *value = pattern
            .captures(summary)
            .and_then(|c| c[1].parse::<f64>().ok())
            .unwrap_or(0.0);
    }
    values
}

/// Clean annotated CSV bytes, returning the new CSV and row counts.
///
/// # Arguments
///
/// * `bytes` - A checkpoint file's contents, header row first
///
/// # Returns
///
/// The cleaned CSV (emotion axes appended as `Joy..Disgust`, each written
/// as a float such as `0.0` or `0.4`) and how many rows were kept or
/// dropped.
///
/// # Errors
///
/// [`DatasetError::MissingColumn`] if there is no `emotion` column, or
/// [`DatasetError::Csv`] on malformed input.
pub fn clean_csv(bytes: &[u8]) -> Result<(Vec<u8>, CleanStats), DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);
    let headers = reader.headers()?.clone();
    let emotion_idx = column_index(&headers, "emotion")?;
    let categories_idx = column_index(&headers, "categories").ok();

    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut out_headers: Vec<&str> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != emotion_idx)
        .map(|(_, h)| h)
        .collect();
    out_headers.extend(EMOTION_AXES);
    writer.write_record(&out_headers)?;

    let mut stats = CleanStats::default();
    for record in reader.records() {
        let record = record?;
        if is_sentinel_row(&record) {
            stats.dropped += 1;
            continue;
        }

        let emotions = parse_emotions(record.get(emotion_idx).unwrap_or_default());
        let mut out: Vec<String> = record
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != emotion_idx)
            .map(|(i, field)| {
                if Some(i) == categories_idx {
                    field.replace('\\', "")
                } else {
                    field.to_string()
                }
            })
            .collect();
        out.extend(emotions.iter().map(|v| format!("{v:?}")));
        writer.write_record(&out)?;
        stats.kept += 1;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| DatasetError::Csv(e.into_error().into()))?;
    Ok((bytes, stats))
}

/// Clean the CSV at `input` into `output`, creating `output`'s directory
/// if needed.
///
/// # Errors
///
/// Returns an error if `input` cannot be read or cleaned, or `output`
/// cannot be written.
#[instrument(level = "info", skip_all, fields(input = %input.display(), output = %output.display()))]
pub async fn clean_file(input: &Path, output: &Path) -> Result<CleanStats, Box<dyn Error>> {
    let bytes = read_bytes(input).await?;
    let (cleaned, stats) = clean_csv(&bytes)?;

    ensure_parent_dir(output).await?;
    fs::write(output, cleaned).await?;
    info!(kept = stats.kept, dropped = stats.dropped, "Cleaned data saved");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANNOTATED: &str = "\
title,sentiment_label,sentiment_score,categories,concepts,emotion,entities
Good,Positive,0.8,\\/news\\/politics,Election,\"Joy: 0.40, Sadness: 0.10, Anger: 0.05, Fear: 0.02, Disgust: 0.01\",Ohio
Lost,No URL Found,0.0,No URL,No URL,No URL,No URL
Blank,No Text,0.0,No Text,No Text,No Text,No Text
Broken,Error,0.0,Error,Error,Error,Error
Quiet,Neutral,0.0,None,None,None,None
";

    #[test]
    fn test_parse_emotions_round_trip() {
        let values = parse_emotions("Joy: 0.40, Sadness: 0.10, Anger: 0.05, Fear: 0.02, Disgust: 0.01");
        assert_eq!(values, [0.40, 0.10, 0.05, 0.02, 0.01]);
    }

    #[test]
    fn test_parse_emotions_missing_axis_defaults_to_zero() {
        let values = parse_emotions("Joy: 0.40, Sadness: 0.10, Anger: 0.05, Disgust: 0.01");
        assert_eq!(values[3], 0.0);
        assert_eq!(values[4], 0.01);
        assert_eq!(parse_emotions("None"), [0.0; 5]);
    }

    #[test]
    fn test_is_sentinel_row_case_insensitive() {
        let row = csv::StringRecord::from(vec!["t", "NO URL FOUND", "0"]);
        assert!(is_sentinel_row(&row));
        let row = csv::StringRecord::from(vec!["t", "Positive", "No URL"]);
        assert!(!is_sentinel_row(&row));
        let row = csv::StringRecord::from(vec!["Error handling in Rust", "Positive"]);
        assert!(!is_sentinel_row(&row));
    }

    #[test]
    fn test_clean_csv() {
        let (bytes, stats) = clean_csv(ANNOTATED.as_bytes()).unwrap();
        assert_eq!(stats, CleanStats { kept: 2, dropped: 3 });

        let out = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines[0],
            "title,sentiment_label,sentiment_score,categories,concepts,entities,Joy,Sadness,Anger,Fear,Disgust"
        );
        assert_eq!(lines[1], "Good,Positive,0.8,/news/politics,Election,Ohio,0.4,0.1,0.05,0.02,0.01");
        assert_eq!(lines[2], "Quiet,Neutral,0.0,None,None,None,0.0,0.0,0.0,0.0,0.0");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_clean_requires_emotion_column() {
        let err = clean_csv(b"title,sentiment_label\nA,Positive\n").unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn(ref c) if c == "emotion"));
    }

    #[tokio::test]
    async fn test_clean_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("annotated.csv");
        let output = dir.path().join("clean/cleaned.csv");
        std::fs::write(&input, ANNOTATED).unwrap();

        let stats = clean_file(&input, &output).await.unwrap();
        assert_eq!(stats.kept, 2);
        let cleaned = std::fs::read_to_string(&output).unwrap();
        assert!(!cleaned.contains("Error"));
        assert!(cleaned.contains("Quiet"));
    }
}
