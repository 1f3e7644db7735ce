//! Buffers per-file identification samples until a folder's album can be
//! decided, then finalizes every buffered file at once (§4.10).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::folder_cache::{FolderAlbumCache, ReleaseGroupDurations};
use crate::model::{Candidate, DecisionSource, FolderAlbumDecision, PendingFile, ProcessedRecord};
use crate::organizer;
use crate::processed_log::ProcessedLog;
use crate::tagio;

/// Minimum share of a queued sample needed to elect a release-group by
/// majority vote, given the configured vote sample size and how many files
/// the folder is expected to hold (§4.10 step 2).
fn vote_threshold(observed_track_count: u32, vote_sample_size: usize) -> usize {
    let n = (observed_track_count as usize).min(vote_sample_size).max(1);
    n.div_ceil(2)
}

/// The winning `(releaseGroupId)` by majority vote, if the queue has enough
/// agreement (§4.10 step 2).
fn majority_vote(queue: &[PendingFile], observed_track_count: u32, vote_sample_size: usize) -> Option<String> {
    let threshold = vote_threshold(observed_track_count, vote_sample_size);
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for pending in queue {
        for candidate in &pending.candidates {
            *counts.entry(candidate.release_group_id.as_str()).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count >= threshold)
        .max_by_key(|(_, count)| *count)
        .map(|(rg, _)| rg.to_string())
}

struct FolderState {
    queue: Vec<PendingFile>,
}

/// Per-folder buffering and finalization (§4.10). One instance is shared
/// across all folders (and across worker-pool tasks via `Arc`, §5); each
/// folder's queue is guarded independently so unrelated folders proceed in
/// parallel.
pub struct AlbumBatchProcessor {
    folders: Mutex<HashMap<PathBuf, FolderState>>,
    cache: Arc<FolderAlbumCache>,
    vote_sample_size: usize,
}

impl AlbumBatchProcessor {
    pub fn new(cache: Arc<FolderAlbumCache>, vote_sample_size: usize) -> Self {
        Self {
            folders: Mutex::new(HashMap::new()),
            cache,
            vote_sample_size,
        }
    }

    /// `addPending(folderPath, pending)`.
    pub fn add_pending(&self, folder_path: &Path, pending: PendingFile) {
        let mut folders = self.folders.lock().expect("album batch lock poisoned");
        folders
            .entry(folder_path.to_path_buf())
            .or_insert_with(|| FolderState { queue: Vec::new() })
            .queue
            .push(pending);
    }

    pub fn queue_len(&self, folder_path: &Path) -> usize {
        let folders = self.folders.lock().expect("album batch lock poisoned");
        folders.get(folder_path).map(|s| s.queue.len()).unwrap_or(0)
    }

    /// Snapshot of a folder's queued samples, used by the caller to build
    /// the `candidatePool` for `try_determine`'s duration-sequence fallback.
    pub fn pending_queue(&self, folder_path: &Path) -> Vec<PendingFile> {
        let folders = self.folders.lock().expect("album batch lock poisoned");
        folders.get(folder_path).map(|s| s.queue.clone()).unwrap_or_default()
    }

    /// `tryDetermine(folderPath, observedTrackCount, candidatePool)` (§4.10).
    ///
    /// `candidatePool` supplies the release-group duration sequences needed
    /// for the duration-sequence fallback (step 3); the caller fetches
    /// these from `MetadataClient` since this module has no network access
    /// of its own.
    pub fn try_determine(
        &self,
        folder_path: &Path,
        observed_track_count: u32,
        observed_durations: &[u32],
        candidate_pool: &[ReleaseGroupDurations],
    ) -> Option<FolderAlbumDecision> {
        if let Some(decision) = self.cache.get(folder_path, observed_track_count) {
            return Some(decision);
        }

        let queue = {
            let folders = self.folders.lock().expect("album batch lock poisoned");
            folders.get(folder_path).map(|s| s.queue.clone()).unwrap_or_default()
        };

        if let Some(release_group_id) = majority_vote(&queue, observed_track_count, self.vote_sample_size) {
            let winner = candidate_pool.iter().find(|c| c.release_group_id == release_group_id);
            let decision = match winner {
                Some(w) => FolderAlbumDecision {
                    release_group_id: w.release_group_id.clone(),
                    release_id: Some(w.release_id.clone()),
                    album_title: w.album_title.clone(),
                    album_artist: w.album_artist.clone(),
                    track_count: w.durations.len() as u32,
                    release_date: w.release_date.clone(),
                    similarity: 1.0,
                    source: DecisionSource::Vote,
                },
                None => FolderAlbumDecision {
                    release_group_id: release_group_id.clone(),
                    release_id: None,
                    album_title: String::new(),
                    album_artist: String::new(),
                    track_count: observed_track_count,
                    release_date: None,
                    similarity: 1.0,
                    source: DecisionSource::Vote,
                },
            };
            if self.cache.try_lock(folder_path, decision.clone()) {
                return Some(decision);
            }
            return self.cache.get(folder_path, observed_track_count);
        }

        self.cache.determine_by_duration_sequence(folder_path, observed_durations, candidate_pool)
    }

    /// `forceFinalize(folderPath, fallbackSample)` (§4.10): installs a
    /// FORCED decision from the first complete queued sample when no
    /// election has succeeded and the queue is as large as it will get.
    pub fn force_finalize_decision(&self, folder_path: &Path) -> Option<FolderAlbumDecision> {
        if let Some(decision) = self.cache.get(folder_path, 0) {
            return Some(decision);
        }

        let queue = {
            let folders = self.folders.lock().expect("album batch lock poisoned");
            folders.get(folder_path).map(|s| s.queue.clone()).unwrap_or_default()
        };

        let sample = queue.iter().find(|p| !p.candidates.is_empty())?;
        let candidate = sample.candidates.first()?;
        let decision = FolderAlbumDecision {
            release_group_id: candidate.release_group_id.clone(),
            release_id: None,
            album_title: sample.metadata.album.clone().unwrap_or_else(|| candidate.release_title.clone()),
            album_artist: sample.metadata.album_artist.clone().unwrap_or_default(),
            track_count: queue.len() as u32,
            release_date: sample.metadata.release_date.clone(),
            similarity: 0.0,
            source: DecisionSource::Forced,
        };
        self.cache.try_lock(folder_path, decision.clone());
        Some(decision)
    }

    /// `finalizeAll(folderPath, decision)` (§4.10): writes every queued
    /// file under the decided album identity and drains the queue.
    pub async fn finalize_all(
        &self,
        folder_path: &Path,
        decision: &FolderAlbumDecision,
        output_root: &Path,
        processed_log: &dyn ProcessedLog,
    ) -> Result<Vec<PathBuf>> {
        let queue = {
            let mut folders = self.folders.lock().expect("album batch lock poisoned");
            folders.remove(folder_path).map(|s| s.queue).unwrap_or_default()
        };

        let mut written = Vec::with_capacity(queue.len());
        for pending in queue {
            let mut metadata = pending.metadata.clone();
            let lock_fields = crate::model::MusicMetadata {
                album: Some(decision.album_title.clone()),
                album_artist: Some(decision.album_artist.clone()),
                release_group_id: Some(decision.release_group_id.clone()),
                release_id: decision.release_id.clone(),
                release_date: decision.release_date.clone(),
                ..Default::default()
            };
            metadata.merge_from_lock(&lock_fields);

            tagio::write_tags(&pending.processing_path, &metadata, pending.cover_bytes.as_deref())?;
            let dest = organizer::move_into_library(output_root, &pending.processing_path, &metadata)?;

            let record = ProcessedRecord {
                file_path: pending.original_path.clone(),
                file_hash: crate::health::hash::compute_file_hash(&dest).unwrap_or_default(),
                file_size: std::fs::metadata(&dest).map(|m| m.len()).unwrap_or(0),
                processed_at: chrono::Utc::now(),
                recording_id: metadata.recording_id.clone().unwrap_or_default(),
                artist: metadata.artist.clone().unwrap_or_default(),
                title: metadata.title.clone().unwrap_or_default(),
                album: metadata.album.clone().unwrap_or_default(),
            };
            let _ = processed_log.mark(&record).await;

            written.push(dest);
        }

        Ok(written)
    }

    /// `processBeforeShutdown()`: force-finalize and drain every folder
    /// still holding a non-empty queue.
    pub fn folders_pending_shutdown(&self) -> Vec<PathBuf> {
        let folders = self.folders.lock().expect("album batch lock poisoned");
        folders.iter().filter(|(_, s)| !s.queue.is_empty()).map(|(p, _)| p.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MusicMetadata;
    use std::time::SystemTime;

    fn pending(release_group_id: &str) -> PendingFile {
        PendingFile {
            original_path: PathBuf::from(format!("/watch/Album/{release_group_id}.flac")),
            processing_path: PathBuf::from(format!("/watch/Album/{release_group_id}.flac")),
            metadata: MusicMetadata::default(),
            cover_bytes: None,
            candidates: vec![Candidate {
                release_group_id: release_group_id.to_string(),
                release_title: "Album".to_string(),
            }],
            queued_at: SystemTime::now(),
        }
    }

    #[test]
    fn test_vote_threshold_small_folder() {
        assert_eq!(vote_threshold(4, 3), 2);
        assert_eq!(vote_threshold(1, 3), 1);
    }

    #[test]
    fn test_majority_vote_elects_shared_release_group() {
        let queue = vec![pending("rg-a"), pending("rg-a"), pending("rg-b")];
        assert_eq!(majority_vote(&queue, 3, 3), Some("rg-a".to_string()));
    }

    #[test]
    fn test_majority_vote_none_below_threshold() {
        let queue = vec![pending("rg-a"), pending("rg-b"), pending("rg-c")];
        assert_eq!(majority_vote(&queue, 3, 3), None);
    }

    #[test]
    fn test_try_determine_uses_cached_decision_first() {
        let cache = Arc::new(FolderAlbumCache::new(0.90));
        let batch = AlbumBatchProcessor::new(Arc::clone(&cache), 3);
        let folder = Path::new("/watch/Album");
        let existing = FolderAlbumDecision {
            release_group_id: "rg-cached".to_string(),
            release_id: None,
            album_title: "Album".to_string(),
            album_artist: "Artist".to_string(),
            track_count: 3,
            release_date: None,
            similarity: 1.0,
            source: DecisionSource::QuickScan,
        };
        cache.try_lock(folder, existing.clone());

        let decision = batch.try_determine(folder, 3, &[], &[]).unwrap();
        assert_eq!(decision.release_group_id, "rg-cached");
    }

    #[test]
    fn test_try_determine_elects_by_vote() {
        let cache = Arc::new(FolderAlbumCache::new(0.90));
        let batch = AlbumBatchProcessor::new(Arc::clone(&cache), 3);
        let folder = Path::new("/watch/Album");
        batch.add_pending(folder, pending("rg-a"));
        batch.add_pending(folder, pending("rg-a"));
        batch.add_pending(folder, pending("rg-b"));

        let decision = batch.try_determine(folder, 3, &[], &[]).unwrap();
        assert_eq!(decision.release_group_id, "rg-a");
        assert_eq!(decision.source, DecisionSource::Vote);
    }

    #[test]
    fn test_force_finalize_decision_uses_first_complete_sample() {
        let cache = Arc::new(FolderAlbumCache::new(0.90));
        let batch = AlbumBatchProcessor::new(Arc::clone(&cache), 3);
        let folder = Path::new("/watch/Album");
        batch.add_pending(folder, pending("rg-a"));
        batch.add_pending(folder, pending("rg-b"));

        let decision = batch.force_finalize_decision(folder).unwrap();
        assert_eq!(decision.release_group_id, "rg-a");
        assert_eq!(decision.source, DecisionSource::Forced);
    }

    #[test]
    fn test_folders_pending_shutdown_lists_nonempty_queues() {
        let cache = Arc::new(FolderAlbumCache::new(0.90));
        let batch = AlbumBatchProcessor::new(Arc::clone(&cache), 3);
        let folder = Path::new("/watch/Album");
        batch.add_pending(folder, pending("rg-a"));
        assert_eq!(batch.folders_pending_shutdown(), vec![folder.to_path_buf()]);
    }
}
