//! Input dataset loading.
//!
//! The input is a CSV with a header row and at least a `title` column. A
//! missing column or an empty table is fatal: nothing is processed.

use itertools::Itertools;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{info, instrument, warn};

/// Fatal problems with an input table.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV must contain a '{0}' column")]
    MissingColumn(String),

    #[error("the dataset is empty")]
    Empty,
}

/// Read the file at `path`, mapping I/O failures to [`DatasetError::Io`].
pub(crate) async fn read_bytes(path: &Path) -> Result<Vec<u8>, DatasetError> {
    fs::read(path).await.map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Index of `column` in the CSV header.
pub(crate) fn column_index(
    headers: &csv::StringRecord,
    column: &str,
) -> Result<usize, DatasetError> {
    headers
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| DatasetError::MissingColumn(column.to_string()))
}

/// Parse titles out of CSV bytes, in file order.
///
/// # Arguments
///
/// * `bytes` - CSV contents with a header row containing `title`
///
/// # Returns
///
/// Every non-blank title, trimmed. Blank titles are skipped with a warning.
/// Duplicates are kept.
///
/// # Errors
///
/// [`DatasetError::MissingColumn`] without a `title` column,
/// [`DatasetError::Empty`] when there are no data rows, or
/// [`DatasetError::Csv`] on malformed input.
pub fn parse_titles(bytes: &[u8]) -> Result<Vec<String>, DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);
    let title_idx = column_index(reader.headers()?, "title")?;

    let mut rows = 0usize;
    let mut titles = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows += 1;
        match record.get(title_idx).map(str::trim) {
            Some(title) if !title.is_empty() => titles.push(title.to_string()),
            _ => warn!(row = rows, "Skipping row with blank title"),
        }
    }

    if rows == 0 {
        return Err(DatasetError::Empty);
    }
    Ok(titles)
}

/// Load the title list from the input CSV.
///
/// # Errors
///
/// Everything [`parse_titles`] rejects, plus [`DatasetError::Io`] when the
/// file cannot be read.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load_titles(path: &Path) -> Result<Vec<String>, DatasetError> {
    let bytes = read_bytes(path).await?;
    let titles = parse_titles(&bytes)?;

    let duplicates = titles.iter().duplicates().count();
    if duplicates > 0 {
        warn!(
            duplicates,
            "Input contains repeated titles; each occurrence is processed unless already checkpointed"
        );
    }
    info!(count = titles.len(), "Loaded input titles");
    Ok(titles)
}
