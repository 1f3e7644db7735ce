//! Cheap pre-fingerprint album identification from filesystem evidence
//! alone (§4.9). Tried before the expensive per-file fingerprint path; a
//! hit short-circuits the rest of identification for every file in the
//! folder.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::duration_matcher;
use crate::enrichment::traits::MetadataLookup;
use crate::model::MusicMetadata;
use crate::tagio;

/// `^(?:(artist)\s*-\s*)?(album)(?:\s*\((year)\))?$`, applied to a folder's
/// base name when no tag carries artist/album (§4.9 step 1).
static FOLDER_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:(?P<artist>.+?)\s*-\s*)?(?P<album>.+?)(?:\s*\((?P<year>\d{4})\))?$").unwrap());

/// (artist, album, year) parsed out of a folder name, best-effort.
pub fn parse_folder_name(folder_name: &str) -> Option<(Option<String>, String, Option<String>)> {
    let caps = FOLDER_NAME_PATTERN.captures(folder_name.trim())?;
    let album = caps.name("album")?.as_str().trim().to_string();
    if album.is_empty() {
        return None;
    }
    let artist = caps.name("artist").map(|m| m.as_str().trim().to_string()).filter(|s| !s.is_empty());
    let year = caps.name("year").map(|m| m.as_str().to_string());
    Some((artist, album, year))
}

/// Best-effort (artist, album) for a folder: prefer whatever the file's own
/// tags carry, fall back to parsing the folder name (§4.9 step 1).
fn resolve_artist_album(tags: &MusicMetadata, folder: &Path) -> Option<(String, String)> {
    let tag_artist = tags.album_artist.clone().or_else(|| tags.artist.clone()).filter(|s| !s.trim().is_empty());
    let tag_album = tags.album.clone().filter(|s| !s.trim().is_empty());

    if let (Some(artist), Some(album)) = (&tag_artist, &tag_album) {
        return Some((artist.clone(), album.clone()));
    }

    let folder_name = folder.file_name()?.to_str()?;
    let (parsed_artist, parsed_album, _year) = parse_folder_name(folder_name)?;
    let artist = tag_artist.or(parsed_artist)?;
    let album = tag_album.unwrap_or(parsed_album);
    Some((artist, album))
}

/// `QuickScan::scan` (§4.9): returns `(metadata, similarity)` for the first
/// release-search candidate whose duration sequence reaches `threshold`
/// (`config.tuning.duration_match_threshold`) against the folder's observed
/// durations.
pub async fn scan(
    client: &dyn MetadataLookup,
    file: &Path,
    folder: &Path,
    folder_audio_files: &[std::path::PathBuf],
    threshold: f32,
) -> Option<(MusicMetadata, f32)> {
    let tags = tagio::read_tags(file).ok()?;
    let (artist, album) = resolve_artist_album(&tags, folder)?;

    let candidates = client.search_release(&album, &artist).await.ok()?;
    if candidates.is_empty() {
        return None;
    }

    let observed = tagio::extract_duration_sequence(folder_audio_files);

    for candidate in candidates {
        let Some(release_group_id) = candidate.release_group_id.as_deref() else {
            continue;
        };
        let Ok(sequence) = client.get_release_duration_sequence(release_group_id).await else {
            continue;
        };
        let similarity = duration_matcher::similarity(&observed, &sequence.durations);
        if similarity >= threshold {
            return Some((candidate, similarity));
        }
    }
    None
}
