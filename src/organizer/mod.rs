//! Destination path construction and the final move into the output
//! library (§4.11 step 13, §6).
//!
//! Layout: `<OutputRoot>/<albumArtist>/<album>/<track# - title>.<ext>`.
//! Falls back to `Unknown Artist`/`Unknown Album`/`Track` for any field left
//! unset after the identification pipeline has done what it can.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::model::MusicMetadata;

/// Build the destination path for `source_path` given its final metadata,
/// without touching the filesystem. Used both to move a file and to preview
/// where it will land.
pub fn destination_path(output_root: &Path, source_path: &Path, metadata: &MusicMetadata) -> PathBuf {
    let ext = source_path.extension().and_then(|e| e.to_str()).unwrap_or("");

    let album_artist = metadata
        .album_artist
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("Unknown Artist");
    let album = metadata
        .album
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("Unknown Album");
    let title = metadata
        .title
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("Track");

    let file_stem = match metadata.track_no {
        Some(n) => format!("{:02} - {}", n, sanitize_filename(title)),
        None => sanitize_filename(title),
    };

    let file_name = if ext.is_empty() {
        file_stem
    } else {
        format!("{}.{}", file_stem, ext)
    };

    output_root
        .join(sanitize_filename(album_artist))
        .join(sanitize_filename(album))
        .join(file_name)
}

/// Move `source_path` to its computed destination under `output_root`,
/// creating parent directories as needed. Falls back to copy+delete across
/// filesystem boundaries, same as `TagIO`'s atomic-write fallback.
pub fn move_into_library(output_root: &Path, source_path: &Path, metadata: &MusicMetadata) -> Result<PathBuf> {
    let dest = destination_path(output_root, source_path, metadata);

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(Error::Io)?;
    }

    if fs::rename(source_path, &dest).is_err() {
        fs::copy(source_path, &dest).map_err(Error::Io)?;
        fs::remove_file(source_path).map_err(Error::Io)?;
    }

    Ok(dest)
}

/// Replace `\ / : * ? " < > |` with `_`, strip trailing dots, and collapse
/// an empty result to `Track` (§6).
fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect();
    let trimmed = replaced.trim_end_matches('.');
    if trimmed.is_empty() {
        "Track".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_metadata() -> MusicMetadata {
        MusicMetadata {
            title: Some("Song Title".to_string()),
            album_artist: Some("Test Artist".to_string()),
            album: Some("Test Album".to_string()),
            track_no: Some(5),
            ..Default::default()
        }
    }

    #[test]
    fn test_sanitize_filename_replaces_invalid_chars() {
        assert_eq!(sanitize_filename("AC/DC"), "AC_DC");
        assert_eq!(sanitize_filename("Track: Title"), "Track_ Title");
        assert_eq!(sanitize_filename("Valid Name"), "Valid Name");
        assert_eq!(sanitize_filename("a<b>c"), "a_b_c");
        assert_eq!(sanitize_filename("pipe|test"), "pipe_test");
    }

    #[test]
    fn test_sanitize_filename_strips_trailing_dots() {
        assert_eq!(sanitize_filename("Mr. Mister."), "Mr. Mister");
    }

    #[test]
    fn test_sanitize_filename_collapses_empty_to_track() {
        assert_eq!(sanitize_filename(""), "Track");
        assert_eq!(sanitize_filename("..."), "Track");
    }

    #[test]
    fn test_destination_path_builds_expected_layout() {
        let source = Path::new("/tmp/song.mp3");
        let dest_root = Path::new("/music");
        let dest = destination_path(dest_root, source, &sample_metadata());
        assert_eq!(dest, PathBuf::from("/music/Test Artist/Test Album/05 - Song Title.mp3"));
    }

    #[test]
    fn test_destination_path_falls_back_on_missing_fields() {
        let dest = destination_path(Path::new("/out"), Path::new("/test.flac"), &MusicMetadata::default());
        assert_eq!(dest, PathBuf::from("/out/Unknown Artist/Unknown Album/Track.flac"));
    }

    #[test]
    fn test_destination_path_sanitizes_special_chars() {
        let metadata = MusicMetadata {
            title: Some("What?".to_string()),
            album_artist: Some("AC/DC".to_string()),
            album: Some("Back: In Black".to_string()),
            ..Default::default()
        };
        let dest = destination_path(Path::new("/out"), Path::new("/test.mp3"), &metadata);
        assert_eq!(dest, PathBuf::from("/out/AC_DC/Back_ In Black/What_.mp3"));
    }

    #[test]
    fn test_move_into_library_moves_file() {
        let temp = tempdir().unwrap();
        let source_dir = temp.path().join("source");
        let dest_dir = temp.path().join("dest");
        fs::create_dir_all(&source_dir).unwrap();

        let source_file = source_dir.join("test.mp3");
        fs::write(&source_file, b"fake mp3 content").unwrap();

        let dest = move_into_library(&dest_dir, &source_file, &sample_metadata()).unwrap();

        assert!(dest.exists());
        assert!(!source_file.exists());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "fake mp3 content");
    }
}
