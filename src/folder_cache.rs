//! Per-folder locked album identity, the central authority every sibling
//! file consults before writing (§4.8).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::duration_matcher;
use crate::model::{Candidate, DecisionSource, FolderAlbumDecision};

/// Enough of `MetadataClient::get_release_duration_sequence` to run
/// §4.8's `determine_by_duration_sequence` without depending on the whole
/// client (keeps this module testable with plain data).
pub struct ReleaseGroupDurations {
    pub release_group_id: String,
    pub release_id: String,
    pub release_date: Option<String>,
    pub album_title: String,
    pub album_artist: String,
    pub durations: Vec<u32>,
}

/// Central per-folder decision authority (§4.8).
pub struct FolderAlbumCache {
    decisions: Mutex<HashMap<PathBuf, FolderAlbumDecision>>,
    /// Similarity cutoff for `determineByDurationSequence` (§4.6), sourced
    /// from `config.tuning.duration_match_threshold`.
    threshold: f32,
}

impl FolderAlbumCache {
    pub fn new(threshold: f32) -> Self {
        Self {
            decisions: Mutex::new(HashMap::new()),
            threshold,
        }
    }

    /// `get(folderPath, expectedTrackCount) -> decision?` (§4.8). The
    /// `expected_track_count` parameter is accepted for interface symmetry
    /// with the spec; this cache never second-guesses a stored decision
    /// against it — trackCount validation happens where the decision is
    /// first installed.
    pub fn get(&self, folder_path: &Path, _expected_track_count: u32) -> Option<FolderAlbumDecision> {
        self.decisions.lock().expect("folder cache lock poisoned").get(folder_path).cloned()
    }

    /// `tryLock(folderPath, decision)`: installs iff no decision exists or
    /// `decision.source` strictly outranks the current one (P3).
    pub fn try_lock(&self, folder_path: &Path, decision: FolderAlbumDecision) -> bool {
        let mut decisions = self.decisions.lock().expect("folder cache lock poisoned");
        match decisions.get(folder_path) {
            Some(existing) if !existing.should_replace_with(decision.source) => false,
            _ => {
                decisions.insert(folder_path.to_path_buf(), decision);
                true
            }
        }
    }

    /// `determineByDurationSequence(folderPath, candidates[], expectedTrackCount) -> decision?`
    /// (§4.8): for each candidate (in order), run §4.6 against the folder's
    /// observed durations; the first candidate reaching 0.90 wins without
    /// checking the rest (short-circuit). Installs the winner with source
    /// `DURATION_MATCH` via `tryLock`.
    pub fn determine_by_duration_sequence(
        &self,
        folder_path: &Path,
        observed_durations: &[u32],
        candidates: &[ReleaseGroupDurations],
    ) -> Option<FolderAlbumDecision> {
        for candidate in candidates {
            let similarity = duration_matcher::similarity(observed_durations, &candidate.durations);
            if similarity >= self.threshold {
                let decision = FolderAlbumDecision {
                    release_group_id: candidate.release_group_id.clone(),
                    release_id: Some(candidate.release_id.clone()),
                    album_title: candidate.album_title.clone(),
                    album_artist: candidate.album_artist.clone(),
                    track_count: candidate.durations.len() as u32,
                    release_date: candidate.release_date.clone(),
                    similarity,
                    source: DecisionSource::DurationMatch,
                };
                self.try_lock(folder_path, decision.clone());
                return Some(decision);
            }
        }
        None
    }
}

impl Default for FolderAlbumCache {
    fn default() -> Self {
        Self::new(duration_matcher::HIGH_CONFIDENCE_THRESHOLD)
    }
}

/// Union the distinct release-groups named across a folder's queued
/// fingerprint candidates, preserving first-seen order (used to build the
/// candidate pool for `determine_by_duration_sequence`, §4.10 step 3).
pub fn union_candidate_release_groups(candidate_lists: &[Vec<Candidate>]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut ordered = Vec::new();
    for candidates in candidate_lists {
        for candidate in candidates {
            if seen.insert(candidate.release_group_id.clone()) {
                ordered.push(candidate.release_group_id.clone());
            }
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(source: DecisionSource) -> FolderAlbumDecision {
        FolderAlbumDecision {
            release_group_id: "rg-1".to_string(),
            release_id: None,
            album_title: "Album".to_string(),
            album_artist: "Artist".to_string(),
            track_count: 10,
            release_date: None,
            similarity: 0.95,
            source,
        }
    }

    #[test]
    fn test_try_lock_installs_first_decision() {
        let cache = FolderAlbumCache::new(duration_matcher::HIGH_CONFIDENCE_THRESHOLD);
        let folder = Path::new("/watch/Album");
        assert!(cache.try_lock(folder, decision(DecisionSource::Vote)));
        assert!(cache.get(folder, 10).is_some());
    }

    #[test]
    fn test_try_lock_rejects_lower_priority_overwrite() {
        let cache = FolderAlbumCache::new(duration_matcher::HIGH_CONFIDENCE_THRESHOLD);
        let folder = Path::new("/watch/Album");
        cache.try_lock(folder, decision(DecisionSource::DurationMatch));
        assert!(!cache.try_lock(folder, decision(DecisionSource::Vote)));
        assert_eq!(cache.get(folder, 10).unwrap().source, DecisionSource::DurationMatch);
    }

    #[test]
    fn test_try_lock_accepts_higher_priority_overwrite() {
        let cache = FolderAlbumCache::new(duration_matcher::HIGH_CONFIDENCE_THRESHOLD);
        let folder = Path::new("/watch/Album");
        cache.try_lock(folder, decision(DecisionSource::Vote));
        assert!(cache.try_lock(folder, decision(DecisionSource::QuickScan)));
        assert_eq!(cache.get(folder, 10).unwrap().source, DecisionSource::QuickScan);
    }

    #[test]
    fn test_determine_by_duration_sequence_short_circuits_on_first_match() {
        let cache = FolderAlbumCache::new(duration_matcher::HIGH_CONFIDENCE_THRESHOLD);
        let folder = Path::new("/watch/Album");
        let observed = vec![180, 200, 220];
        let candidates = vec![
            ReleaseGroupDurations {
                release_group_id: "rg-good".to_string(),
                release_id: "rel-good".to_string(),
                release_date: Some("2000-01-01".to_string()),
                album_title: "Album".to_string(),
                album_artist: "Artist".to_string(),
                durations: vec![180, 200, 220],
            },
            ReleaseGroupDurations {
                release_group_id: "rg-worse".to_string(),
                release_id: "rel-worse".to_string(),
                release_date: None,
                album_title: "Album".to_string(),
                album_artist: "Artist".to_string(),
                durations: vec![180, 200, 220],
            },
        ];
        let decision = cache.determine_by_duration_sequence(folder, &observed, &candidates).unwrap();
        assert_eq!(decision.release_group_id, "rg-good");
    }

    #[test]
    fn test_union_candidate_release_groups_dedupes_preserving_order() {
        let lists = vec![
            vec![
                Candidate {
                    release_group_id: "a".to_string(),
                    release_title: "A".to_string(),
                },
                Candidate {
                    release_group_id: "b".to_string(),
                    release_title: "B".to_string(),
                },
            ],
            vec![Candidate {
                release_group_id: "a".to_string(),
                release_title: "A".to_string(),
            }],
        ];
        assert_eq!(union_candidate_release_groups(&lists), vec!["a".to_string(), "b".to_string()]);
    }
}
