//! Core domain types shared across the identification pipeline.
//!
//! These are OUR types — they don't change when an external registry changes
//! its response shape. External DTOs are converted into these via the
//! `adapter` module next to each client.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// The pipeline's traveling record for one audio file.
///
/// All string fields may be unset; a field is considered unset if it is
/// `None`, empty, or whitespace-only (see [`MusicMetadata::is_unset`]).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MusicMetadata {
    pub recording_id: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album_artist: Option<String>,
    pub album: Option<String>,
    pub release_date: Option<String>,
    pub track_no: Option<u32>,
    pub disc_no: Option<u32>,
    pub track_count: Option<u32>,
    pub composer: Option<String>,
    pub lyricist: Option<String>,
    pub lyrics: Option<String>,
    pub genres: Vec<String>,
    pub release_group_id: Option<String>,
    pub release_id: Option<String>,
    pub cover_art_url: Option<String>,
    pub cover_art_data: Option<Vec<u8>>,
}

impl MusicMetadata {
    /// A field is unset if missing, empty, or whitespace-only.
    pub fn is_unset(field: &Option<String>) -> bool {
        match field {
            None => true,
            Some(s) => s.trim().is_empty(),
        }
    }

    /// Merge `lock` fields over `self` for album-level fields (lock wins),
    /// keeping per-file fields from `self` when `lock` leaves them unset.
    ///
    /// This implements §4.11 step 10: new values win for
    /// title/artist/album/albumArtist/releaseDate, while composer/lyricist/
    /// lyrics/genres/discNo/trackNo are preserved from the source (`self`)
    /// whenever the incoming value is unset.
    pub fn merge_from_lock(&mut self, lock: &MusicMetadata) {
        if !Self::is_unset(&lock.title) {
            self.title = lock.title.clone();
        }
        if !Self::is_unset(&lock.artist) {
            self.artist = lock.artist.clone();
        }
        if !Self::is_unset(&lock.album) {
            self.album = lock.album.clone();
        }
        if !Self::is_unset(&lock.album_artist) {
            self.album_artist = lock.album_artist.clone();
        }
        if !Self::is_unset(&lock.release_date) {
            self.release_date = lock.release_date.clone();
        }
        if lock.release_group_id.is_some() {
            self.release_group_id = lock.release_group_id.clone();
        }
        if lock.release_id.is_some() {
            self.release_id = lock.release_id.clone();
        }

        if !Self::is_unset(&lock.composer) && Self::is_unset(&self.composer) {
            self.composer = lock.composer.clone();
        }
        if !Self::is_unset(&lock.lyricist) && Self::is_unset(&self.lyricist) {
            self.lyricist = lock.lyricist.clone();
        }
        if !Self::is_unset(&lock.lyrics) && Self::is_unset(&self.lyrics) {
            self.lyrics = lock.lyrics.clone();
        }
        if self.genres.is_empty() {
            self.genres = lock.genres.clone();
        }
        if self.disc_no.is_none() {
            self.disc_no = lock.disc_no;
        }
        if self.track_no.is_none() {
            self.track_no = lock.track_no;
        }
    }
}

/// Where a [`FolderAlbumDecision`] got its evidence from.
///
/// Ordered by strict priority (`QuickScan` outranks everything else); derive
/// `PartialOrd`/`Ord` on the declaration order so `source_a > source_b` reads
/// naturally as "higher priority".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DecisionSource {
    Vote,
    DurationMatch,
    Forced,
    QuickScan,
}

/// A folder's locked album identity. One per album-root directory.
#[derive(Debug, Clone, PartialEq)]
pub struct FolderAlbumDecision {
    pub release_group_id: String,
    pub release_id: Option<String>,
    pub album_title: String,
    pub album_artist: String,
    pub track_count: u32,
    pub release_date: Option<String>,
    pub similarity: f32,
    pub source: DecisionSource,
}

impl FolderAlbumDecision {
    /// Whether `incoming` is allowed to replace `self` under the
    /// strict-priority rule (§4.8): a lower-or-equal priority write is a
    /// silent no-op.
    pub fn should_replace_with(&self, incoming_source: DecisionSource) -> bool {
        incoming_source > self.source
    }
}

/// A durable "this path has been handled" record (§3, §4.7).
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedRecord {
    pub file_path: PathBuf,
    pub file_hash: String,
    pub file_size: u64,
    pub processed_at: chrono::DateTime<chrono::Utc>,
    pub recording_id: String,
    pub artist: String,
    pub title: String,
    pub album: String,
}

/// Sentinel `recordingId` values reserved for terminal non-success outcomes.
pub const FAILED_SENTINEL: &str = "FAILED";
pub const CUE_SPLIT_SENTINEL: &str = "CUE_SPLIT";
pub const UNKNOWN_SENTINEL: &str = "UNKNOWN";

/// `(releaseGroupId, releaseTitle)` gathered from fingerprint-lookup
/// responses while a folder's album is still undecided.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub release_group_id: String,
    pub release_title: String,
}

/// A file queued under a folder path until that folder's album is decided
/// or force-finalized (§3, §4.10).
#[derive(Debug, Clone)]
pub struct PendingFile {
    pub original_path: PathBuf,
    pub processing_path: PathBuf,
    pub metadata: MusicMetadata,
    pub cover_bytes: Option<Vec<u8>>,
    pub candidates: Vec<Candidate>,
    pub queued_at: SystemTime,
}

/// The four terminal outcomes an [`crate::processor::AudioFileProcessor`]
/// may report for one file (§4.11, §7). Modeled as data, not exceptions, per
/// the design note in §9.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Success,
    DelayRetry,
    NetworkErrorRetry,
    PermanentFail,
}

/// Compute the album root: the first-level child of `watch_root` that
/// contains `file_path` (§GLOSSARY "Album root").
///
/// Returns `None` if `file_path` is not a descendant of `watch_root`, or if
/// `file_path`'s parent *is* `watch_root` itself (a "loose file", §GLOSSARY).
pub fn album_root(watch_root: &Path, file_path: &Path) -> Option<PathBuf> {
    let rel = file_path.strip_prefix(watch_root).ok()?;
    let mut components = rel.components();
    let first = components.next()?;
    if components.next().is_none() {
        // file_path's only path component under watch_root is itself: loose file.
        return None;
    }
    Some(watch_root.join(first))
}

/// Whether `file_path`'s parent directory is exactly `watch_root`
/// (§GLOSSARY "Loose file").
pub fn is_loose_file(watch_root: &Path, file_path: &Path) -> bool {
    file_path.parent() == Some(watch_root)
}
