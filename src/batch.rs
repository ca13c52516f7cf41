//! Buffered writer that flushes result rows to the checkpoint store.
//!
//! Rows accumulate in arrival order. When the buffer reaches the batch size
//! it is appended to the store and cleared. A failed flush leaves the buffer
//! intact so the next push (or [`BatchWriter::finish`]) retries it.

use std::error::Error;
use tracing::{info, instrument};

use crate::checkpoint::CheckpointStore;
use crate::models::AnnotationResult;

/// Accumulates rows and appends them to a [`CheckpointStore`] every
/// `batch_size` rows.
#[derive(Debug)]
pub struct BatchWriter {
    store: CheckpointStore,
    batch_size: usize,
    buffer: Vec<AnnotationResult>,
    flushes: usize,
    rows_written: usize,
}

impl BatchWriter {
    /// `batch_size` is clamped to at least one row.
    pub fn new(store: CheckpointStore, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            store,
            batch_size,
            buffer: Vec::with_capacity(batch_size),
            flushes: 0,
            rows_written: 0,
        }
    }

    /// Buffer a row, flushing if the batch is full.
    ///
    /// # Arguments
    ///
    /// * `row` - The next result row, in input order
    ///
    /// # Errors
    ///
    /// Returns the store's error when a triggered flush fails. The row is
    /// kept in the buffer either way, and the next push or
    /// [`BatchWriter::finish`] retries the whole buffer.
    pub async fn push(&mut self, row: AnnotationResult) -> Result<(), Box<dyn Error>> {
        self.buffer.push(row);
        if self.buffer.len() >= self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    /// Append everything buffered to the store.
    #[instrument(level = "debug", skip_all, fields(pending = self.buffer.len()))]
    pub async fn flush(&mut self) -> Result<(), Box<dyn Error>> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.store.append(&self.buffer).await?;

        let count = self.buffer.len();
        self.buffer.clear();
        self.flushes += 1;
        self.rows_written += count;
        info!(
            rows = count,
            total = self.rows_written,
            path = %self.store.path().display(),
            "Saved batch"
        );
        Ok(())
    }

    /// Flush the remainder once the input is exhausted.
    ///
    /// # Returns
    ///
    /// Totals over the writer's lifetime.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails. The buffered rows are lost
    /// with the writer, so callers treat this as fatal.
    pub async fn finish(mut self) -> Result<BatchStats, Box<dyn Error>> {
        self.flush().await?;
        Ok(BatchStats {
            flushes: self.flushes,
            rows_written: self.rows_written,
        })
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// What a [`BatchWriter`] wrote over its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchStats {
    pub flushes: usize,
    pub rows_written: usize,
}
