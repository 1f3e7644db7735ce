//! Adapter layer: convert fingerprint-service DTOs to domain recordings.
//!
//! This is the only place DTO types are converted. If the upstream service
//! changes its response shape, only this file and `dto.rs` need to change.

use super::{dto, FingerprintRecording, ReleaseGroupRef};
use crate::enrichment::EnrichmentError;

/// Convert a lookup response into the recordings it names.
///
/// An empty result list is not an error (§4.1): the caller decides what to
/// do with "nothing recognized".
pub fn to_recordings(response: dto::LookupResponse) -> Result<Vec<FingerprintRecording>, EnrichmentError> {
    if response.status != "ok" {
        let error = response.error.unwrap_or(dto::ApiError {
            code: -1,
            message: "unknown error".to_string(),
        });
        return Err(EnrichmentError::ApiError(error.message));
    }

    Ok(response
        .results
        .into_iter()
        .flat_map(|result| {
            let score = result.score;
            result
                .recordings
                .into_iter()
                .map(move |r| convert_recording(r, score))
        })
        .collect())
}

fn convert_recording(recording: dto::Recording, score: f32) -> FingerprintRecording {
    let artist = recording.artists.first().map(|a| a.name.clone());
    let release_groups = recording
        .releasegroups
        .into_iter()
        .map(|rg| ReleaseGroupRef {
            id: rg.id,
            title: rg.title.unwrap_or_default(),
        })
        .collect();
    let album = recording.releases.first().and_then(|r| r.title.clone());

    FingerprintRecording {
        recording_id: recording.id,
        title: recording.title,
        artist,
        album,
        release_groups,
        score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_response(status: &str, results: Vec<dto::LookupResult>) -> dto::LookupResponse {
        dto::LookupResponse {
            status: status.to_string(),
            results,
            error: None,
        }
    }

    fn make_recording(id: &str, title: Option<&str>) -> dto::Recording {
        dto::Recording {
            id: id.to_string(),
            title: title.map(String::from),
            duration: None,
            artists: vec![],
            releases: vec![],
            releasegroups: vec![],
        }
    }

    #[test]
    fn test_convert_successful_response() {
        let response = make_response(
            "ok",
            vec![dto::LookupResult {
                id: "aid-1".into(),
                score: 0.9,
                recordings: vec![make_recording("mbid-1", Some("Test Song"))],
            }],
        );

        let recordings = to_recordings(response).unwrap();
        assert_eq!(recordings.len(), 1);
        assert_eq!(recordings[0].title.as_deref(), Some("Test Song"));
        assert_eq!(recordings[0].recording_id, "mbid-1");
    }

    #[test]
    fn test_convert_error_response() {
        let response = dto::LookupResponse {
            status: "error".to_string(),
            results: vec![],
            error: Some(dto::ApiError {
                code: 4,
                message: "rate limit".to_string(),
            }),
        };
        let result = to_recordings(response);
        assert!(matches!(result, Err(EnrichmentError::ApiError(_))));
    }

    #[test]
    fn test_empty_recordings_is_not_an_error() {
        let response = make_response("ok", vec![]);
        let recordings = to_recordings(response).unwrap();
        assert!(recordings.is_empty());
    }

    #[test]
    fn test_release_groups_carried_through() {
        let mut recording = make_recording("mbid-2", Some("Song"));
        recording.releasegroups = vec![dto::ReleaseGroup {
            id: "rg-1".into(),
            title: Some("Album".into()),
            release_type: Some("Album".into()),
            secondarytypes: vec![],
            artists: vec![],
        }];
        let response = make_response(
            "ok",
            vec![dto::LookupResult {
                id: "aid-1".into(),
                score: 0.8,
                recordings: vec![recording],
            }],
        );
        let recordings = to_recordings(response).unwrap();
        assert_eq!(recordings[0].release_groups.len(), 1);
        assert_eq!(recordings[0].release_groups[0].id, "rg-1");
    }
}
