//! The checkpoint store: the growing output CSV, doubling as the resume ledger.
//!
//! The store is read once at start-up to build the set of titles already
//! processed, and afterwards only appended to. A single process owns the
//! file for the duration of a run.
//!
//! # Append semantics
//!
//! - A destination that does not exist (or is zero-length) gets the header
//!   row on the next append.
//! - Every append is all-or-nothing: rows are serialized in memory, written
//!   in one call and synced. If the write fails, the file is truncated back
//!   to its previous length so no partial row is left behind.
//! - A process killed mid-write can still leave an unterminated last line.
//!   Readers ignore everything after the final newline, and the next append
//!   truncates that torn tail before writing, so the title it belonged to is
//!   processed again.

use std::collections::HashSet;
use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::dataset::column_index;
use crate::models::AnnotationResult;

/// Handle to the output CSV.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Titles already present in the store.
    ///
    /// # Returns
    ///
    /// Trimmed titles of every complete row. A torn last line or a row with
    /// the wrong field count is not counted.
    ///
    /// A missing file means no prior progress. An unreadable or corrupt file
    /// is treated the same way, with a warning, since that can cause
    /// reprocessing.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    pub async fn load_titles(&self) -> HashSet<String> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No checkpoint found; starting fresh");
                return HashSet::new();
            }
            Err(e) => {
                warn!(error = %e, "Checkpoint unreadable; treating as no prior progress");
                return HashSet::new();
            }
        };

        match parse_checkpoint_titles(&bytes) {
            Ok(titles) => {
                info!(count = titles.len(), "Loaded checkpointed titles");
                titles
            }
            Err(e) => {
                warn!(error = %e, "Checkpoint corrupt; treating as no prior progress");
                HashSet::new()
            }
        }
    }

    /// Durably append `rows`, writing the header first if the store is new.
    ///
    /// # Arguments
    ///
    /// * `rows` - Result rows in the order they should appear in the file
    ///
    /// # Returns
    ///
    /// `Ok(())` once the rows are written and synced. Appending nothing is a
    /// no-op and does not create the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, repaired, written or
    /// synced. On a failed write the file is rolled back to its previous
    /// length.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display(), rows = rows.len()))]
    pub async fn append(&self, rows: &[AnnotationResult]) -> Result<(), Box<dyn Error>> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut existing_len = match fs::metadata(&self.path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(Box::new(e)),
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        if existing_len > 0 {
            let complete = complete_len(&fs::read(&self.path).await?) as u64;
            if complete < existing_len {
                warn!(existing_len, complete, "Dropping torn trailing row");
                file.set_len(complete).await?;
                existing_len = complete;
            }
        }
        let payload = serialize_rows(rows, existing_len == 0)?;

        let written = async {
            file.write_all(&payload).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            warn!(error = %e, existing_len, "Append failed; rolling back partial write");
            if let Err(rollback) = file.set_len(existing_len).await {
                warn!(error = %rollback, "Rollback of partial write failed");
            }
            return Err(Box::new(e));
        }

        debug!(bytes = payload.len(), header = existing_len == 0, "Appended rows");
        Ok(())
    }
}

/// Length of `bytes` up to and including the last newline.
fn complete_len(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |pos| pos + 1)
}

/// Extract the `title` column from checkpoint CSV bytes.
///
/// Only newline-terminated rows with as many fields as the header count.
fn parse_checkpoint_titles(bytes: &[u8]) -> Result<HashSet<String>, Box<dyn Error>> {
    let bytes = &bytes[..complete_len(bytes)];
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(HashSet::new());
    }
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);
    let headers = reader.headers()?.clone();
    let title_idx = column_index(&headers, "title")?;

    let mut titles = HashSet::new();
    for record in reader.records() {
        let record = record?;
        if record.len() != headers.len() {
            warn!(
                fields = record.len(),
                expected = headers.len(),
                "Ignoring malformed checkpoint row"
            );
            continue;
        }
        if let Some(title) = record.get(title_idx) {
            titles.insert(title.trim().to_string());
        }
    }
    Ok(titles)
}

/// Serialize rows to CSV in memory, optionally with the header row.
fn serialize_rows(rows: &[AnnotationResult], with_header: bool) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(with_header)
        .from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    Ok(writer.into_inner().map_err(|e| e.into_error())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Annotation;

    fn row(title: &str) -> AnnotationResult {
        AnnotationResult::new(title, Annotation::empty())
    }

    #[tokio::test]
    async fn test_missing_store_yields_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("out.csv"));
        assert!(store.load_titles().await.is_empty());
    }

    #[tokio::test]
    async fn test_first_append_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("out.csv"));

        store.append(&[row("A"), row("B")]).await.unwrap();
        store.append(&[row("C")]).await.unwrap();

        let contents = std::fs::read_to_string(store.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines[0],
            "title,sentiment_label,sentiment_score,categories,concepts,emotion,entities"
        );
        assert_eq!(lines.len(), 4);
        assert_eq!(contents.matches("sentiment_label").count(), 1);
        assert!(lines[1].starts_with("A,Neutral,0"));
        assert!(lines[3].starts_with("C,"));
    }

    #[tokio::test]
    async fn test_load_titles_after_append() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("out.csv"));
        store
            .append(&[row("A"), row("Title, with comma"), row("C")])
            .await
            .unwrap();

        let titles = store.load_titles().await;
        assert_eq!(titles.len(), 3);
        assert!(titles.contains("Title, with comma"));
    }

    #[tokio::test]
    async fn test_zero_length_store_gets_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "").unwrap();
        let store = CheckpointStore::new(&path);

        assert!(store.load_titles().await.is_empty());
        store.append(&[row("A")]).await.unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("title,"));
    }

    #[tokio::test]
    async fn test_store_without_title_column_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "headline,score\nA,1\n").unwrap();
        let store = CheckpointStore::new(&path);
        assert!(store.load_titles().await.is_empty());
    }

    #[tokio::test]
    async fn test_append_nothing_does_not_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("out.csv"));
        store.append(&[]).await.unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn test_torn_tail_and_short_rows_are_not_checkpointed() {
        let bytes = b"title,a,b\nDone,1,2\nShort,1\nTorn,1,2";
        let titles = parse_checkpoint_titles(bytes).unwrap();
        assert_eq!(titles, HashSet::from(["Done".to_string()]));
    }

    #[tokio::test]
    async fn test_append_truncates_torn_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let store = CheckpointStore::new(&path);
        store.append(&[row("A")]).await.unwrap();
        let clean = std::fs::read_to_string(&path).unwrap();

        let mut torn = clean.clone();
        torn.push_str("B,Neut");
        std::fs::write(&path, &torn).unwrap();
        assert!(!store.load_titles().await.contains("B"));

        store.append(&[row("B")]).await.unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with(&clean));
        assert!(!contents.contains("NeutB"));
        let titles = store.load_titles().await;
        assert_eq!(titles.len(), 2);
        assert!(titles.contains("B"));
    }

    #[tokio::test]
    async fn test_torn_header_is_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "title,sentim").unwrap();
        let store = CheckpointStore::new(&path);

        store.append(&[row("A")]).await.unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("title,sentiment_label,"));
        assert_eq!(contents.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_append_to_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        assert!(store.append(&[row("A")]).await.is_err());
    }
}
