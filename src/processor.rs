//! `AudioFileProcessor`: the driver for a single path (§4.11).
//!
//! CUE-sheet splitting, format normalization, and the admin dashboard are
//! external collaborators (§1, §2) — this module only consumes the narrow
//! contract it needs from the CUE-split collaborator ([`CueSplitter`]).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::album_batch::AlbumBatchProcessor;
use crate::config::Config;
use crate::enrichment::fingerprint::FingerprintRecording;
use crate::enrichment::traits::{CoverLookup, FingerprintLookup, LyricsLookup, MetadataLookup};
use crate::folder_cache::FolderAlbumCache;
use crate::model::{
    album_root, is_loose_file, Candidate, MusicMetadata, PendingFile, ProcessOutcome, ProcessedRecord,
    FAILED_SENTINEL, UNKNOWN_SENTINEL,
};
use crate::organizer;
use crate::processed_log::ProcessedLog;
use crate::quickscan;
use crate::tagio;
use crate::version_match;

/// Extensions that mark a file as still downloading (§4.11 step 2, §4.12).
const IN_PROGRESS_EXTENSIONS: &[&str] = &["!qb", "!qB", "part", "ut!", "crdownload", "tmp", "download"];

/// Narrow contract the processor needs from the CUE-sheet splitter: given a
/// folder, produce the split output paths if (and only if) the folder is a
/// single-file CUE-sheet album; `None` otherwise. The actual splitting
/// implementation lives outside this crate's scope (§1).
#[async_trait]
pub trait CueSplitter: Send + Sync {
    async fn split_if_cue_album(&self, folder: &Path) -> Option<Vec<PathBuf>>;
}

/// Default collaborator: never recognizes a CUE album. A deployment that
/// wants CUE-splitting supplies its own `CueSplitter`.
pub struct NoCueSplitter;

#[async_trait]
impl CueSplitter for NoCueSplitter {
    async fn split_if_cue_album(&self, _folder: &Path) -> Option<Vec<PathBuf>> {
        None
    }
}

/// All collaborators `AudioFileProcessor` drives a file through (§4.11).
/// Every field is an `Arc` (or cheaply `Clone`-able) so the whole processor
/// can itself be `Arc`-wrapped and shared across the worker pool (§5).
pub struct AudioFileProcessor {
    pub fingerprint: Arc<dyn FingerprintLookup>,
    pub metadata: Arc<dyn MetadataLookup>,
    pub cover: Arc<dyn CoverLookup>,
    pub lyrics: Arc<dyn LyricsLookup>,
    pub cue_splitter: Arc<dyn CueSplitter>,
    pub folder_cache: Arc<FolderAlbumCache>,
    pub album_batch: Arc<AlbumBatchProcessor>,
    pub processed_log: Arc<dyn ProcessedLog>,
    pub config: Config,
}

impl AudioFileProcessor {
    /// Drive `path` (under `watch_root`) through identification (§4.11).
    pub async fn process(&self, watch_root: &Path, path: &Path) -> ProcessOutcome {
        if self.processed_log.is_processed(path).await.unwrap_or(false) {
            return ProcessOutcome::Success;
        }

        let folder = path.parent().unwrap_or(watch_root);

        if has_in_progress_sibling(folder) {
            return ProcessOutcome::DelayRetry;
        }

        if let Some(split_outputs) = self.cue_splitter.split_if_cue_album(folder).await {
            self.mark_sentinel(path, crate::model::CUE_SPLIT_SENTINEL).await;
            let mut outcome = ProcessOutcome::Success;
            for output in split_outputs {
                let result = Box::pin(self.process(watch_root, &output)).await;
                if result != ProcessOutcome::Success {
                    outcome = result;
                }
            }
            return outcome;
        }

        let loose = is_loose_file(watch_root, path);
        let root = album_root(watch_root, path);
        let expected_track_count = root
            .as_deref()
            .map(|r| count_audio_files(r))
            .unwrap_or(1);

        let lock = if loose {
            None
        } else {
            root.as_deref().and_then(|r| self.folder_cache.get(r, expected_track_count))
        };

        let lock = if lock.is_none() && !loose {
            if let (Some(r), Some(siblings)) = (root.as_deref(), root.as_deref().map(list_audio_files)) {
                if let Some((candidate, similarity)) =
                    quickscan::scan(self.metadata.as_ref(), path, r, &siblings, self.config.tuning.duration_match_threshold).await
                {
                    let decision = crate::model::FolderAlbumDecision {
                        release_group_id: candidate.release_group_id.clone().unwrap_or_default(),
                        release_id: candidate.release_id.clone(),
                        album_title: candidate.album.clone().unwrap_or_default(),
                        album_artist: candidate.album_artist.clone().unwrap_or_default(),
                        track_count: expected_track_count,
                        release_date: candidate.release_date.clone(),
                        similarity,
                        source: crate::model::DecisionSource::QuickScan,
                    };
                    self.folder_cache.try_lock(r, decision.clone());
                    Some(decision)
                } else {
                    lock
                }
            } else {
                lock
            }
        } else {
            lock
        };

        let (duration_secs, recordings) = match self.fingerprint.identify(path).await {
            Ok(result) => result,
            Err(_) if lock.is_some() => (tagio::read_duration_secs(path).unwrap_or(0), Vec::new()),
            Err(_) => return self.no_recognition_fail(watch_root, path, folder).await,
        };

        if recordings.is_empty() && lock.is_none() {
            return self.no_recognition_fail(watch_root, path, folder).await;
        }

        let mut metadata = if recordings.is_empty() {
            synthesize_from_tags(path, lock.as_ref())
        } else {
            let best = choose_best_recording(&recordings, lock.as_ref(), path);
            let preferred_release_group_id = lock.as_ref().map(|l| l.release_group_id.as_str());
            let preferred_release_id = lock.as_ref().and_then(|l| l.release_id.as_deref());

            match self
                .metadata
                .get_recording_by_id(
                    &best.recording_id,
                    expected_track_count,
                    preferred_release_group_id,
                    preferred_release_id,
                    &self.config.library.country_priority,
                )
                .await
            {
                Ok(fetched) => self.reconcile_with_lock(fetched, lock.as_ref(), duration_secs, &best.title, &best.artist).await,
                Err(_) => synthesize_from_tags(path, lock.as_ref()),
            }
        };

        let mut merged = tagio::read_tags(path).unwrap_or_default();
        merged.merge_from_lock(&metadata);
        metadata = merged;

        let cover_bytes = self
            .cover
            .get_cover(folder, Some(path), metadata.release_group_id.as_deref())
            .await
            .ok()
            .flatten();

        if let (Some(title), Some(artist), Some(album)) = (&metadata.title, &metadata.artist, &metadata.album) {
            metadata.lyrics = self.lyrics.get_lyrics(title, artist, album, duration_secs).await;
        }

        if loose {
            self.write_and_mark(watch_root, path, path, &metadata, cover_bytes).await
        } else {
            let root = root.expect("non-loose file has an album root");
            let candidates = recordings
                .iter()
                .flat_map(|r| r.release_groups.iter())
                .map(|rg| Candidate {
                    release_group_id: rg.id.clone(),
                    release_title: rg.title.clone(),
                })
                .collect();

            self.album_batch.add_pending(
                &root,
                PendingFile {
                    original_path: path.to_path_buf(),
                    processing_path: path.to_path_buf(),
                    metadata,
                    cover_bytes,
                    candidates,
                    queued_at: std::time::SystemTime::now(),
                },
            );

            self.try_finalize_folder(&root, expected_track_count).await;
            ProcessOutcome::Success
        }
    }

    async fn reconcile_with_lock(
        &self,
        fetched: MusicMetadata,
        lock: Option<&crate::model::FolderAlbumDecision>,
        duration_secs: u32,
        fallback_title: &str,
        fallback_artist: &str,
    ) -> MusicMetadata {
        let Some(lock) = lock else { return fetched };

        let disagrees = fetched.release_group_id.as_deref() != Some(lock.release_group_id.as_str());
        if !disagrees {
            return fetched;
        }

        let retried = match &lock.release_id {
            Some(release_id) => self
                .metadata
                .get_track_from_locked_release_by_duration(release_id, duration_secs, fallback_title, fallback_artist)
                .await
                .ok()
                .flatten(),
            None => self
                .metadata
                .get_track_from_locked_release_group_by_duration(
                    &lock.release_group_id,
                    duration_secs,
                    fallback_title,
                    fallback_artist,
                )
                .await
                .ok()
                .flatten(),
        };

        let mut reconciled = retried.unwrap_or(fetched);
        reconciled.album = Some(lock.album_title.clone());
        reconciled.album_artist = Some(lock.album_artist.clone());
        reconciled.release_group_id = Some(lock.release_group_id.clone());
        reconciled.release_id = lock.release_id.clone();
        reconciled.release_date = lock.release_date.clone();
        reconciled
    }

    async fn try_finalize_folder(&self, folder: &Path, expected_track_count: u32) {
        let observed = list_audio_files(folder)
            .iter()
            .map(|p| tagio::read_duration_secs(p).unwrap_or(0))
            .collect::<Vec<_>>();

        let candidate_pool = self.build_candidate_pool(folder).await;

        if let Some(decision) = self.album_batch.try_determine(folder, expected_track_count, &observed, &candidate_pool) {
            let _ = self
                .album_batch
                .finalize_all(folder, &decision, &self.config.library.output_dir, self.processed_log.as_ref())
                .await;
            return;
        }

        if self.album_batch.queue_len(folder) as u32 >= expected_track_count {
            if let Some(decision) = self.album_batch.force_finalize_decision(folder) {
                let _ = self
                    .album_batch
                    .finalize_all(folder, &decision, &self.config.library.output_dir, self.processed_log.as_ref())
                    .await;
            }
        }
    }

    /// Build the `candidatePool` consulted by `try_determine`'s
    /// duration-sequence fallback (§4.10 step 3): the distinct release
    /// groups named by this folder's queued fingerprint candidates, each
    /// resolved to its track-duration sequence.
    async fn build_candidate_pool(&self, folder: &Path) -> Vec<crate::folder_cache::ReleaseGroupDurations> {
        let queue = self.album_batch.pending_queue(folder);
        let candidate_lists: Vec<_> = queue.iter().map(|p| p.candidates.clone()).collect();
        let release_group_ids = crate::folder_cache::union_candidate_release_groups(&candidate_lists);

        let mut pool = Vec::new();
        for release_group_id in release_group_ids {
            let Ok(sequence) = self.metadata.get_release_duration_sequence(&release_group_id).await else {
                continue;
            };
            let sample = queue.iter().find(|p| p.candidates.iter().any(|c| c.release_group_id == release_group_id));
            let fallback_title = sample
                .and_then(|p| p.candidates.iter().find(|c| c.release_group_id == release_group_id))
                .map(|c| c.release_title.clone())
                .unwrap_or_default();
            let album_title = sample.and_then(|p| p.metadata.album.clone()).unwrap_or(fallback_title);
            let album_artist = sample.and_then(|p| p.metadata.album_artist.clone()).unwrap_or_default();

            pool.push(crate::folder_cache::ReleaseGroupDurations {
                release_group_id,
                release_id: sequence.release_id,
                release_date: sequence.release_date,
                album_title,
                album_artist,
                durations: sequence.durations,
            });
        }
        pool
    }

    async fn write_and_mark(
        &self,
        watch_root: &Path,
        original_path: &Path,
        processing_path: &Path,
        metadata: &MusicMetadata,
        cover_bytes: Option<Vec<u8>>,
    ) -> ProcessOutcome {
        if tagio::write_tags(processing_path, metadata, cover_bytes.as_deref()).is_err() {
            return self
                .permanent_fail(watch_root, original_path, original_path.parent().unwrap_or(original_path), FAILED_SENTINEL)
                .await;
        }
        let dest = match organizer::move_into_library(&self.config.library.output_dir, processing_path, metadata) {
            Ok(dest) => dest,
            Err(_) => {
                return self
                    .permanent_fail(watch_root, original_path, original_path.parent().unwrap_or(original_path), FAILED_SENTINEL)
                    .await
            }
        };

        let record = ProcessedRecord {
            file_path: original_path.to_path_buf(),
            file_hash: crate::health::hash::compute_file_hash(&dest).unwrap_or_default(),
            file_size: std::fs::metadata(&dest).map(|m| m.len()).unwrap_or(0),
            processed_at: chrono::Utc::now(),
            recording_id: metadata.recording_id.clone().unwrap_or_default(),
            artist: metadata.artist.clone().unwrap_or_default(),
            title: metadata.title.clone().unwrap_or_default(),
            album: metadata.album.clone().unwrap_or_default(),
        };
        let _ = self.processed_log.mark(&record).await;
        ProcessOutcome::Success
    }

    /// No fingerprint match and no folder lock to fall back on (§4.11 step
    /// 6, §6): try the partial directory if a cover can still be resolved,
    /// otherwise the failed directory with `recordingId = UNKNOWN`.
    async fn no_recognition_fail(&self, watch_root: &Path, path: &Path, folder: &Path) -> ProcessOutcome {
        let cover = self.cover.get_cover(folder, Some(path), None).await.ok().flatten();
        match cover {
            Some(bytes) => self.partial_fail(watch_root, path, bytes).await,
            None => self.permanent_fail(watch_root, path, folder, UNKNOWN_SENTINEL).await,
        }
    }

    /// Cover resolved but fingerprinting produced nothing (§6): copy to
    /// `partialDir`, preserving the path relative to `watch_root`, embedding
    /// the resolved cover if the file doesn't already carry one.
    async fn partial_fail(&self, watch_root: &Path, path: &Path, cover: Vec<u8>) -> ProcessOutcome {
        let rel = path.strip_prefix(watch_root).unwrap_or(path);
        let dest = self.config.library.partial_dir.join(rel);
        if let Some(parent) = dest.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = std::fs::copy(path, &dest);

        if !tagio::has_embedded_cover(&dest).unwrap_or(false) {
            if let Ok(tags) = tagio::read_tags(&dest) {
                let _ = tagio::write_tags(&dest, &tags, Some(&cover));
            }
        }

        self.mark_sentinel(path, UNKNOWN_SENTINEL).await;
        ProcessOutcome::PermanentFail
    }

    async fn permanent_fail(&self, watch_root: &Path, path: &Path, folder: &Path, sentinel: &str) -> ProcessOutcome {
        let dest = if is_loose_file(watch_root, path) {
            self.config.library.failed_dir.join(path.file_name().unwrap_or_default())
        } else {
            let folder_name = folder.file_name().unwrap_or_default();
            self.config
                .library
                .failed_dir
                .join(folder_name)
                .join(path.file_name().unwrap_or_default())
        };
        if let Some(parent) = dest.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = std::fs::copy(path, &dest);

        self.mark_sentinel(path, sentinel).await;
        ProcessOutcome::PermanentFail
    }

    async fn mark_sentinel(&self, path: &Path, sentinel: &str) {
        let record = ProcessedRecord {
            file_path: path.to_path_buf(),
            file_hash: crate::health::hash::compute_file_hash(path).unwrap_or_default(),
            file_size: std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
            processed_at: chrono::Utc::now(),
            recording_id: sentinel.to_string(),
            artist: String::new(),
            title: String::new(),
            album: String::new(),
        };
        let _ = self.processed_log.mark(&record).await;
    }
}

fn has_in_progress_sibling(folder: &Path) -> bool {
    let Ok(entries) = std::fs::read_dir(folder) else {
        return false;
    };
    entries.flatten().any(|entry| {
        entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| IN_PROGRESS_EXTENSIONS.iter().any(|marker| marker.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    })
}

fn list_audio_files(folder: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(folder)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| tagio::is_supported_extension(p))
        .collect();
    files.sort();
    files
}

fn count_audio_files(folder: &Path) -> u32 {
    list_audio_files(folder).len() as u32
}

/// Build fallback metadata when the fingerprint registry returns nothing
/// but a folder decision is already locked (§4.11 step 8).
fn synthesize_from_tags(path: &Path, lock: Option<&crate::model::FolderAlbumDecision>) -> MusicMetadata {
    let mut metadata = tagio::read_tags(path).unwrap_or_default();
    if MusicMetadata::is_unset(&metadata.title) {
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(UNKNOWN_SENTINEL);
        metadata.title = Some(stem.to_string());
    }
    if let Some(lock) = lock {
        metadata.album = Some(lock.album_title.clone());
        metadata.album_artist = Some(lock.album_artist.clone());
        metadata.release_group_id = Some(lock.release_group_id.clone());
        metadata.release_id = lock.release_id.clone();
        metadata.release_date = lock.release_date.clone();
    }
    metadata
}

/// Choose the best fingerprint recording (§4.11 step 9, §4.13): prefer one
/// whose release-groups intersect the lock, then one with complete
/// title+artist, then break ties by version-indicator similarity against
/// the filename.
fn choose_best_recording<'r>(
    recordings: &'r [FingerprintRecording],
    lock: Option<&crate::model::FolderAlbumDecision>,
    path: &Path,
) -> &'r FingerprintRecording {
    let locked_matches: Vec<&FingerprintRecording> = match lock {
        Some(l) => recordings
            .iter()
            .filter(|r| r.release_groups.iter().any(|rg| rg.id == l.release_group_id))
            .collect(),
        None => Vec::new(),
    };
    let pool: Vec<&FingerprintRecording> = if locked_matches.is_empty() {
        recordings.iter().collect()
    } else {
        locked_matches
    };

    let complete: Vec<&FingerprintRecording> = pool
        .iter()
        .copied()
        .filter(|r| r.title.as_deref().is_some_and(|s| !s.trim().is_empty()) && r.artist.as_deref().is_some_and(|s| !s.trim().is_empty()))
        .collect();
    let pool = if complete.is_empty() { pool } else { complete };

    if pool.len() == 1 {
        return pool[0];
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    let titles: Vec<&str> = pool.iter().map(|r| r.title.as_deref().unwrap_or("")).collect();
    match version_match::best_match(stem, &titles) {
        Some(winner_title) => pool
            .iter()
            .find(|r| r.title.as_deref() == Some(winner_title))
            .copied()
            .unwrap_or(pool[0]),
        None => pool[0],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_in_progress_sibling_detects_partial_download() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("track.mp3.part"), b"").unwrap();
        assert!(has_in_progress_sibling(dir.path()));
    }

    #[test]
    fn test_has_in_progress_sibling_false_when_clean() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("track.mp3"), b"").unwrap();
        assert!(!has_in_progress_sibling(dir.path()));
    }

    #[test]
    fn test_choose_best_recording_prefers_locked_release_group() {
        let lock = crate::model::FolderAlbumDecision {
            release_group_id: "rg-locked".to_string(),
            release_id: None,
            album_title: "Album".to_string(),
            album_artist: "Artist".to_string(),
            track_count: 1,
            release_date: None,
            similarity: 1.0,
            source: crate::model::DecisionSource::QuickScan,
        };
        let recordings = vec![
            FingerprintRecording {
                recording_id: "rec-a".to_string(),
                title: Some("Song".to_string()),
                artist: Some("Artist".to_string()),
                album: None,
                release_groups: vec![crate::enrichment::fingerprint::ReleaseGroupRef {
                    id: "rg-other".to_string(),
                    title: "Other".to_string(),
                }],
                score: 0.8,
            },
            FingerprintRecording {
                recording_id: "rec-b".to_string(),
                title: Some("Song".to_string()),
                artist: Some("Artist".to_string()),
                album: None,
                release_groups: vec![crate::enrichment::fingerprint::ReleaseGroupRef {
                    id: "rg-locked".to_string(),
                    title: "Album".to_string(),
                }],
                score: 0.7,
            },
        ];
        let best = choose_best_recording(&recordings, Some(&lock), Path::new("/watch/Album/song.flac"));
        assert_eq!(best.recording_id, "rec-b");
    }
}
