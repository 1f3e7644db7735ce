//! Adapter layer: convert metadata-registry DTOs to [`MusicMetadata`].
//!
//! This is the only place DTO types are converted to domain types. If the
//! upstream registry changes its response format, only this file and
//! `dto.rs` need to change.

use super::dto;
use crate::model::MusicMetadata;

/// Convert a recording lookup response into metadata, given the release
/// chosen by the caller's release-selection pass (§4.2).
pub fn recording_to_metadata(response: dto::RecordingResponse, release: Option<&dto::Release>) -> MusicMetadata {
    let artist = build_artist_string(&response.artist_credit);

    let (album, album_artist, release_date, release_group_id, release_id, track_no, track_count) =
        match release {
            Some(r) => release_fields(r),
            None => (None, None, None, None, None, None, None),
        };

    MusicMetadata {
        recording_id: Some(response.id),
        title: Some(response.title),
        artist,
        album_artist,
        album,
        release_date,
        track_no,
        disc_no: None,
        track_count,
        composer: None,
        lyricist: None,
        lyrics: None,
        genres: Vec::new(),
        release_group_id,
        release_id,
        cover_art_url: None,
        cover_art_data: None,
    }
}

/// Convert one search-result release into metadata (§4.2 `searchRelease`).
pub fn release_to_metadata(release: &dto::Release) -> MusicMetadata {
    let (album, album_artist, release_date, release_group_id, release_id, _, track_count) =
        release_fields(release);

    MusicMetadata {
        recording_id: None,
        title: None,
        artist: album_artist.clone(),
        album_artist,
        album,
        release_date,
        track_no: None,
        disc_no: None,
        track_count,
        composer: None,
        lyricist: None,
        lyrics: None,
        genres: Vec::new(),
        release_group_id,
        release_id,
        cover_art_url: None,
        cover_art_data: None,
    }
}

#[allow(clippy::type_complexity)]
fn release_fields(
    release: &dto::Release,
) -> (
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<u32>,
    Option<u32>,
) {
    let album = Some(release.title.clone());
    let release_id = Some(release.id.clone());
    let release_group_id = release.release_group.as_ref().map(|rg| rg.id.clone());
    let release_date = release.date.clone();
    let track_count = release.media.first().and_then(|m| m.track_count);
    (album, None, release_date, release_group_id, release_id, None, track_count)
}

/// Find the track in `release`'s tracklist whose duration is closest to
/// `observed_duration_sec`, and build metadata for it (§4.2
/// `getTrackFromLockedReleaseByDuration`).
pub fn closest_track_by_duration(
    release: &dto::Release,
    observed_duration_sec: u32,
    fallback_title: &str,
    fallback_artist: &str,
) -> Option<MusicMetadata> {
    let all_tracks: Vec<(&dto::Medium, &dto::Track)> = release
        .media
        .iter()
        .flat_map(|m| m.tracks.iter().map(move |t| (m, t)))
        .collect();

    let (medium, track) = all_tracks.into_iter().min_by_key(|(_, t)| {
        let secs = t
            .recording
            .as_ref()
            .and_then(|r| r.length)
            .or(t.length)
            .map(|ms| (ms / 1000) as i64)
            .unwrap_or(i64::MAX / 2);
        (secs - observed_duration_sec as i64).abs()
    })?;

    let (album, _, release_date, release_group_id, release_id, _, track_count) = release_fields(release);

    Some(MusicMetadata {
        recording_id: track.recording.as_ref().map(|r| r.id.clone()),
        title: track
            .title
            .clone()
            .or_else(|| track.recording.as_ref().and_then(|r| r.title.clone()))
            .or_else(|| Some(fallback_title.to_string())),
        artist: Some(fallback_artist.to_string()),
        album_artist: Some(fallback_artist.to_string()),
        album,
        release_date,
        track_no: track.position,
        disc_no: medium.position,
        track_count,
        composer: None,
        lyricist: None,
        lyrics: None,
        genres: Vec::new(),
        release_group_id,
        release_id,
        cover_art_url: None,
        cover_art_data: None,
    })
}

fn build_artist_string(credits: &[dto::ArtistCredit]) -> Option<String> {
    if credits.is_empty() {
        return None;
    }
    let mut result = String::new();
    for credit in credits {
        let name = credit.name.as_ref().unwrap_or(&credit.artist.name);
        result.push_str(name);
        if let Some(ref join) = credit.joinphrase {
            result.push_str(join);
        }
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_release(id: &str, date: Option<&str>, rg_id: &str) -> dto::Release {
        dto::Release {
            id: id.to_string(),
            title: "Test Album".to_string(),
            status: Some("Official".to_string()),
            date: date.map(String::from),
            country: None,
            release_group: Some(dto::ReleaseGroup {
                id: rg_id.to_string(),
                title: "Test Album".to_string(),
                primary_type: Some("Album".to_string()),
                first_release_date: None,
            }),
            media: vec![],
        }
    }

    #[test]
    fn test_recording_to_metadata_without_release() {
        let recording = dto::RecordingResponse {
            id: "rec-1".into(),
            title: "Song".into(),
            length: None,
            disambiguation: None,
            artist_credit: vec![],
            releases: vec![],
        };
        let metadata = recording_to_metadata(recording, None);
        assert_eq!(metadata.recording_id.as_deref(), Some("rec-1"));
        assert_eq!(metadata.title.as_deref(), Some("Song"));
        assert!(metadata.album.is_none());
    }

    #[test]
    fn test_recording_to_metadata_with_release() {
        let recording = dto::RecordingResponse {
            id: "rec-1".into(),
            title: "Song".into(),
            length: None,
            disambiguation: None,
            artist_credit: vec![],
            releases: vec![],
        };
        let release = make_release("rel-1", Some("2001-05-01"), "rg-1");
        let metadata = recording_to_metadata(recording, Some(&release));
        assert_eq!(metadata.album.as_deref(), Some("Test Album"));
        assert_eq!(metadata.release_id.as_deref(), Some("rel-1"));
        assert_eq!(metadata.release_group_id.as_deref(), Some("rg-1"));
    }

    #[test]
    fn test_build_collaboration_artist() {
        let credits = vec![
            dto::ArtistCredit {
                artist: dto::Artist {
                    id: "queen-id".into(),
                    name: "Queen".into(),
                    sort_name: None,
                    artist_type: None,
                },
                name: Some("Queen".into()),
                joinphrase: Some(" & ".into()),
            },
            dto::ArtistCredit {
                artist: dto::Artist {
                    id: "bowie-id".into(),
                    name: "David Bowie".into(),
                    sort_name: None,
                    artist_type: None,
                },
                name: None,
                joinphrase: None,
            },
        ];
        assert_eq!(build_artist_string(&credits), Some("Queen & David Bowie".to_string()));
    }

    #[test]
    fn test_closest_track_by_duration() {
        let mut release = make_release("rel-1", None, "rg-1");
        release.media = vec![dto::Medium {
            position: Some(1),
            format: None,
            track_count: Some(2),
            tracks: vec![
                dto::Track {
                    position: Some(1),
                    number: Some("1".into()),
                    title: Some("Intro".into()),
                    length: Some(60_000),
                    recording: Some(dto::RecordingRef {
                        id: "rec-intro".into(),
                        title: Some("Intro".into()),
                        length: Some(60_000),
                    }),
                },
                dto::Track {
                    position: Some(2),
                    number: Some("2".into()),
                    title: Some("Main".into()),
                    length: Some(200_000),
                    recording: Some(dto::RecordingRef {
                        id: "rec-main".into(),
                        title: Some("Main".into()),
                        length: Some(200_000),
                    }),
                },
            ],
        }];

        let matched = closest_track_by_duration(&release, 201, "fallback", "Artist").unwrap();
        assert_eq!(matched.recording_id.as_deref(), Some("rec-main"));
        assert_eq!(matched.track_no, Some(2));
    }
}
