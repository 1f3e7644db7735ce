//! Durable "this path has been handled" record (§4.7).
//!
//! Two interchangeable backends behind one trait: an append-oriented CSV
//! file for single-instance deployments, or a SQLite table for anything
//! wanting concurrent readers. `FAILED`/`CUE_SPLIT` sentinels in
//! `recording_id` record terminal non-success outcomes so a path is never
//! silently reprocessed.

mod file;
mod relational;

use std::path::Path;

pub use file::FileProcessedLog;
pub use relational::RelationalProcessedLog;

use crate::model::ProcessedRecord;

/// Errors raised by a `ProcessedLog` backend.
#[derive(Debug, thiserror::Error)]
pub enum ProcessedLogError {
    #[error("I/O error accessing processed log at {0}: {1}")]
    Io(std::path::PathBuf, std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("malformed record at line {0}: {1}")]
    MalformedRecord(usize, String),
}

/// Durable record of handled paths (§4.7).
#[async_trait::async_trait]
pub trait ProcessedLog: Send + Sync {
    /// `true` if `path` already has a row (success or terminal failure).
    async fn is_processed(&self, path: &Path) -> Result<bool, ProcessedLogError>;

    /// Record `path` as handled. Serialized per backend: the file backend
    /// holds a process-global lock, the relational backend relies on the
    /// unique key on `file_path`.
    async fn mark(&self, record: &ProcessedRecord) -> Result<(), ProcessedLogError>;
}
