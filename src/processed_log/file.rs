//! Local file backend: append-only CSV, reloaded into memory on start.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{ProcessedLog, ProcessedLogError};
use crate::model::ProcessedRecord;

struct State {
    seen: HashSet<PathBuf>,
}

/// CSV-backed `ProcessedLog`, one record per line in the shape
/// `hash,size,path,processedAt,recordingId,artist,title,album` (§6).
pub struct FileProcessedLog {
    path: PathBuf,
    state: Mutex<State>,
}

impl FileProcessedLog {
    /// Load `path`, creating it if absent. Every existing row is read into
    /// memory so `is_processed` never touches disk.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ProcessedLogError> {
        let path = path.into();
        let mut seen = HashSet::new();

        if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|e| ProcessedLogError::Io(path.clone(), e))?;
            let mut reader = csv::ReaderBuilder::new().has_headers(false).from_reader(contents.as_bytes());
            for (line_no, result) in reader.records().enumerate() {
                let record = result.map_err(|e| ProcessedLogError::MalformedRecord(line_no + 1, e.to_string()))?;
                let file_path = record
                    .get(2)
                    .ok_or_else(|| ProcessedLogError::MalformedRecord(line_no + 1, "missing path field".to_string()))?;
                seen.insert(PathBuf::from(file_path));
            }
        } else if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ProcessedLogError::Io(parent.to_path_buf(), e))?;
        }

        Ok(Self {
            path,
            state: Mutex::new(State { seen }),
        })
    }

    fn append_line(&self, record: &ProcessedRecord) -> Result<(), ProcessedLogError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| ProcessedLogError::Io(self.path.clone(), e))?;

        let line = format!(
            "{},{},{},{},{},{},{},{}\n",
            record.file_hash,
            record.file_size,
            record.file_path.display(),
            record.processed_at.to_rfc3339(),
            record.recording_id,
            escape_csv(&record.artist),
            escape_csv(&record.title),
            escape_csv(&record.album),
        );

        file.write_all(line.as_bytes())
            .map_err(|e| ProcessedLogError::Io(self.path.clone(), e))
    }
}

fn escape_csv(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[async_trait::async_trait]
impl ProcessedLog for FileProcessedLog {
    async fn is_processed(&self, path: &Path) -> Result<bool, ProcessedLogError> {
        let state = self.state.lock().expect("processed log lock poisoned");
        Ok(state.seen.contains(path))
    }

    async fn mark(&self, record: &ProcessedRecord) -> Result<(), ProcessedLogError> {
        // Hold the lock across both the write and the in-memory update so a
        // concurrent `is_processed` never observes the line on disk before
        // the set reflects it, or vice versa.
        let mut state = self.state.lock().expect("processed log lock poisoned");
        self.append_line(record)?;
        state.seen.insert(record.file_path.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn sample_record(path: &Path) -> ProcessedRecord {
        ProcessedRecord {
            file_path: path.to_path_buf(),
            file_hash: "abc123".to_string(),
            file_size: 1024,
            processed_at: Utc::now(),
            recording_id: "rec-1".to_string(),
            artist: "Artist".to_string(),
            title: "Title".to_string(),
            album: "Album".to_string(),
        }
    }

    #[tokio::test]
    async fn test_mark_then_is_processed() {
        let dir = tempdir().unwrap();
        let log = FileProcessedLog::open(dir.path().join("processed.csv")).unwrap();
        let path = Path::new("/music/track.mp3");

        assert!(!log.is_processed(path).await.unwrap());
        log.mark(&sample_record(path)).await.unwrap();
        assert!(log.is_processed(path).await.unwrap());
    }

    #[tokio::test]
    async fn test_reload_picks_up_existing_rows() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("processed.csv");
        let path = Path::new("/music/existing.flac");

        {
            let log = FileProcessedLog::open(&log_path).unwrap();
            log.mark(&sample_record(path)).await.unwrap();
        }

        let reopened = FileProcessedLog::open(&log_path).unwrap();
        assert!(reopened.is_processed(path).await.unwrap());
    }

    #[tokio::test]
    async fn test_fields_with_commas_are_escaped() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("processed.csv");
        let path = Path::new("/music/comma.mp3");

        let mut record = sample_record(path);
        record.artist = "Artist, Feat. Other".to_string();

        let log = FileProcessedLog::open(&log_path).unwrap();
        log.mark(&record).await.unwrap();

        let reopened = FileProcessedLog::open(&log_path).unwrap();
        assert!(reopened.is_processed(path).await.unwrap());
    }
}
