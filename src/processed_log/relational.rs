//! Relational backend: single table, unique key on `file_path`, `INSERT …
//! ON CONFLICT DO UPDATE` for idempotent re-marking.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use super::{ProcessedLog, ProcessedLogError};
use crate::model::ProcessedRecord;

/// SQLite-backed `ProcessedLog` (§4.7, §6).
pub struct RelationalProcessedLog {
    pool: SqlitePool,
}

impl RelationalProcessedLog {
    /// Connect to (creating if absent) the SQLite database at `path`,
    /// running the core's single schema migration. 30s acquire timeout
    /// (§5).
    pub async fn connect(path: &Path) -> Result<Self, ProcessedLogError> {
        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            ProcessedLogError::Database(sqlx::Error::Migrate(Box::new(e)))
        })?;

        Ok(Self { pool })
    }

    #[cfg(test)]
    pub async fn connect_in_memory() -> Result<Self, ProcessedLogError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect("sqlite::memory:")
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            ProcessedLogError::Database(sqlx::Error::Migrate(Box::new(e)))
        })?;
        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl ProcessedLog for RelationalProcessedLog {
    async fn is_processed(&self, path: &Path) -> Result<bool, ProcessedLogError> {
        let path_str = path.to_string_lossy();
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM processed_files WHERE file_path = ?")
            .bind(path_str.as_ref())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn mark(&self, record: &ProcessedRecord) -> Result<(), ProcessedLogError> {
        let path_str = record.file_path.to_string_lossy().to_string();
        let file_name = record
            .file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let processed_time = record.processed_at.to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO processed_files
                (file_hash, file_name, file_path, file_size, processed_time, recording_id, artist, title, album)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(file_path) DO UPDATE SET
                file_hash = excluded.file_hash,
                file_size = excluded.file_size,
                processed_time = excluded.processed_time,
                recording_id = excluded.recording_id,
                artist = excluded.artist,
                title = excluded.title,
                album = excluded.album,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&record.file_hash)
        .bind(&file_name)
        .bind(&path_str)
        .bind(record.file_size as i64)
        .bind(&processed_time)
        .bind(&record.recording_id)
        .bind(&record.artist)
        .bind(&record.title)
        .bind(&record.album)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sample_record(path: &Path) -> ProcessedRecord {
        ProcessedRecord {
            file_path: path.to_path_buf(),
            file_hash: "abc123".to_string(),
            file_size: 2048,
            processed_at: chrono::Utc::now(),
            recording_id: "rec-1".to_string(),
            artist: "Artist".to_string(),
            title: "Title".to_string(),
            album: "Album".to_string(),
        }
    }

    #[tokio::test]
    async fn test_mark_then_is_processed() {
        let log = RelationalProcessedLog::connect_in_memory().await.unwrap();
        let path = PathBuf::from("/music/track.flac");

        assert!(!log.is_processed(&path).await.unwrap());
        log.mark(&sample_record(&path)).await.unwrap();
        assert!(log.is_processed(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_is_idempotent_on_same_path() {
        let log = RelationalProcessedLog::connect_in_memory().await.unwrap();
        let path = PathBuf::from("/music/track.flac");

        log.mark(&sample_record(&path)).await.unwrap();
        let mut updated = sample_record(&path);
        updated.recording_id = "rec-2".to_string();
        log.mark(&updated).await.unwrap();

        assert!(log.is_processed(&path).await.unwrap());
    }
}
