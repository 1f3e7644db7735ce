//! Tag reading and writing (§4.5).
//!
//! Uses `lofty` for format-independent metadata access across MP3, FLAC,
//! M4A, OGG, and WAV. Writes are atomic: a sibling temp file is written and
//! fsynced, then renamed over the original, so a crash mid-write never
//! leaves a corrupted tag behind.

use std::fs::File;
use std::path::Path;

use lofty::config::WriteOptions;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag, TagExt};

use crate::model::MusicMetadata;

/// Extensions TagIO (and the rest of the pipeline) understands.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "flac", "m4a", "ogg", "wav"];

pub fn is_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Read all tag fields this pipeline cares about from `path`.
pub fn read_tags(path: &Path) -> crate::error::Result<MusicMetadata> {
    let tagged_file = Probe::open(path)
        .map_err(|e| crate::error::Error::tag(path, e.to_string()))?
        .read()
        .map_err(|e| crate::error::Error::tag(path, e.to_string()))?;

    let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());

    let genres = tag
        .map(|t| {
            t.get_strings(&ItemKey::Genre)
                .map(String::from)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    Ok(MusicMetadata {
        recording_id: tag.and_then(|t| t.get_string(&ItemKey::MusicBrainzRecordingId).map(String::from)),
        title: tag.and_then(|t| t.title().map(|s| s.to_string())),
        artist: tag.and_then(|t| t.artist().map(|s| s.to_string())),
        album_artist: tag.and_then(|t| t.get_string(&ItemKey::AlbumArtist).map(String::from)),
        album: tag.and_then(|t| t.album().map(|s| s.to_string())),
        release_date: tag.and_then(|t| t.year().map(|y| y.to_string())),
        track_no: tag.and_then(|t| t.track()),
        disc_no: tag.and_then(|t| t.disk()),
        track_count: tag.and_then(|t| t.track_total()),
        composer: tag.and_then(|t| t.get_string(&ItemKey::Composer).map(String::from)),
        lyricist: tag.and_then(|t| t.get_string(&ItemKey::Lyricist).map(String::from)),
        lyrics: tag.and_then(|t| t.get_string(&ItemKey::Lyrics).map(String::from)),
        genres,
        release_group_id: tag.and_then(|t| t.get_string(&ItemKey::MusicBrainzReleaseGroupId).map(String::from)),
        release_id: tag.and_then(|t| t.get_string(&ItemKey::MusicBrainzReleaseId).map(String::from)),
        cover_art_url: None,
        cover_art_data: None,
    })
}

/// `true` if at least one of {title, artist, album} is set (§4.5).
pub fn has_partial_tags(metadata: &MusicMetadata) -> bool {
    !MusicMetadata::is_unset(&metadata.title)
        || !MusicMetadata::is_unset(&metadata.artist)
        || !MusicMetadata::is_unset(&metadata.album)
}

/// `true` if `path`'s primary tag carries a front cover picture.
pub fn has_embedded_cover(path: &Path) -> crate::error::Result<bool> {
    let tagged_file = Probe::open(path)
        .map_err(|e| crate::error::Error::tag(path, e.to_string()))?
        .read()
        .map_err(|e| crate::error::Error::tag(path, e.to_string()))?;
    let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());
    Ok(tag.map(|t| !t.pictures().is_empty()).unwrap_or(false))
}

/// Extract the first embedded picture's raw bytes, if any.
pub fn extract_embedded_cover(path: &Path) -> crate::error::Result<Option<Vec<u8>>> {
    let tagged_file = Probe::open(path)
        .map_err(|e| crate::error::Error::tag(path, e.to_string()))?
        .read()
        .map_err(|e| crate::error::Error::tag(path, e.to_string()))?;
    let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());
    Ok(tag.and_then(|t| t.pictures().first()).map(|p| p.data().to_vec()))
}

/// Read the audio duration in whole seconds, used by the duration matcher
/// (§4.1 `extractDurationSequence`) without touching the network.
pub fn read_duration_secs(path: &Path) -> crate::error::Result<u32> {
    let tagged_file = Probe::open(path)
        .map_err(|e| crate::error::Error::tag(path, e.to_string()))?
        .read()
        .map_err(|e| crate::error::Error::tag(path, e.to_string()))?;
    Ok(tagged_file.properties().duration().as_secs() as u32)
}

/// Read the duration of every path, in the order given. A file that cannot
/// be probed contributes `0` rather than aborting the whole sequence, so a
/// single damaged sibling doesn't poison the whole album's matching.
pub fn extract_duration_sequence(paths: &[std::path::PathBuf]) -> Vec<u32> {
    paths
        .iter()
        .map(|p| read_duration_secs(p).unwrap_or(0))
        .collect()
}

/// Write `metadata` (and optional cover bytes) to `path`, atomically.
///
/// A sibling `<path>.tagio-tmp` file is written, fsynced, then renamed over
/// the original, so a crash mid-write can never corrupt the source file.
pub fn write_tags(
    path: &Path,
    metadata: &MusicMetadata,
    cover_bytes: Option<&[u8]>,
) -> crate::error::Result<()> {
    let mut tagged_file = Probe::open(path)
        .map_err(|e| crate::error::Error::tag(path, e.to_string()))?
        .read()
        .map_err(|e| crate::error::Error::tag(path, e.to_string()))?;

    let tag_type = tagged_file.primary_tag_type();
    if tagged_file.tag(tag_type).is_none() {
        tagged_file.insert_tag(Tag::new(tag_type));
    }
    let tag = tagged_file.tag_mut(tag_type).expect("just ensured present");

    if let Some(title) = &metadata.title {
        tag.set_title(title.clone());
    }
    if let Some(artist) = &metadata.artist {
        tag.set_artist(artist.clone());
    }
    if let Some(album) = &metadata.album {
        tag.set_album(album.clone());
    }
    if let Some(album_artist) = &metadata.album_artist {
        tag.insert_text(ItemKey::AlbumArtist, album_artist.clone());
    }
    if let Some(release_date) = &metadata.release_date {
        if let Ok(year) = release_date[..4.min(release_date.len())].parse::<u32>() {
            tag.set_year(year);
        }
    }
    if let Some(track_no) = metadata.track_no {
        tag.set_track(track_no);
    }
    if let Some(disc_no) = metadata.disc_no {
        tag.set_disk(disc_no);
    }
    if let Some(track_count) = metadata.track_count {
        tag.set_track_total(track_count);
    }
    if let Some(composer) = &metadata.composer {
        tag.insert_text(ItemKey::Composer, composer.clone());
    }
    if let Some(lyricist) = &metadata.lyricist {
        tag.insert_text(ItemKey::Lyricist, lyricist.clone());
    }
    if let Some(lyrics) = &metadata.lyrics {
        tag.insert_text(ItemKey::Lyrics, lyrics.clone());
    }
    for genre in &metadata.genres {
        tag.push(lofty::tag::TagItem::new(
            ItemKey::Genre,
            lofty::tag::ItemValue::Text(genre.clone()),
        ));
    }
    if let Some(recording_id) = &metadata.recording_id {
        tag.insert_text(ItemKey::MusicBrainzRecordingId, recording_id.clone());
    }
    if let Some(release_group_id) = &metadata.release_group_id {
        tag.insert_text(ItemKey::MusicBrainzReleaseGroupId, release_group_id.clone());
    }
    if let Some(release_id) = &metadata.release_id {
        tag.insert_text(ItemKey::MusicBrainzReleaseId, release_id.clone());
    }
    if let Some(cover) = cover_bytes {
        tag.set_picture(
            0,
            Picture::new_unchecked(PictureType::CoverFront, Some(MimeType::Jpeg), None, cover.to_vec()),
        );
    }

    let temp_path = sibling_temp_path(path);
    std::fs::copy(path, &temp_path).map_err(|e| crate::error::Error::tag(path, e.to_string()))?;
    tag.save_to_path(&temp_path, WriteOptions::default())
        .map_err(|e| crate::error::Error::tag(path, e.to_string()))?;

    {
        let file = File::open(&temp_path).map_err(|e| crate::error::Error::tag(path, e.to_string()))?;
        file.sync_all().map_err(|e| crate::error::Error::tag(path, e.to_string()))?;
    }

    std::fs::rename(&temp_path, path).map_err(|e| crate::error::Error::tag(path, e.to_string()))?;
    Ok(())
}

fn sibling_temp_path(path: &Path) -> std::path::PathBuf {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed");
    path.with_file_name(format!(".{file_name}.tagio-tmp"))
}

/// Locate a folder-level cover image file beside `path`, i.e. the folder
/// strategy in §4.3 step (b).
pub fn find_folder_cover_image(folder: &Path) -> Option<std::path::PathBuf> {
    const NAMES: &[&str] = &["cover", "folder", "front"];
    const EXTS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "webp", "tif", "tiff"];

    let entries = std::fs::read_dir(folder).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if NAMES.iter().any(|n| n.eq_ignore_ascii_case(stem))
            && EXTS.iter().any(|e| e.eq_ignore_ascii_case(ext))
        {
            return Some(path);
        }
    }
    None
}
