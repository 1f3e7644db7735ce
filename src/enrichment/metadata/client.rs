//! Metadata-registry HTTP client (MusicBrainz-compatible webservice).
//!
//! The registry requires a descriptive User-Agent and rate-limits to one
//! request per second per client; `RateLimiter` enforces the same bound
//! locally so we never draw a 503 in the first place. 429/503 responses are
//! retried with exponential backoff; other 5xx are retried once; 4xx (other
//! than 429) are reported as permanent failures (§4.2).

use std::time::Duration;

use super::{adapter, dto};
use crate::enrichment::EnrichmentError;
use crate::model::MusicMetadata;
use crate::rate_limiter::{backoff_delay, RateLimiter};

const USER_AGENT: &str = concat!(
    env!("CARGO_PKG_NAME"),
    "/",
    env!("CARGO_PKG_VERSION"),
    " ( https://github.com/crate-minder )"
);

/// Client for recording/release/release-group lookups (§4.2).
pub struct MetadataClient {
    http_client: reqwest::Client,
    base_url: String,
    limiter: RateLimiter,
    max_retries: u32,
}

impl MetadataClient {
    pub fn new() -> Self {
        Self::with_base_url("https://musicbrainz.org/ws/2")
    }

    pub fn with_max_retries(max_retries: u32) -> Self {
        let mut client = Self::new();
        client.max_retries = max_retries;
        client
    }

    #[cfg(test)]
    pub fn with_base_url_for_test(base_url: impl Into<String>) -> Self {
        Self::with_base_url(base_url)
    }

    fn with_base_url(base_url: impl Into<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http_client,
            base_url: base_url.into(),
            limiter: RateLimiter::new(Duration::from_secs(1)),
            max_retries: 5,
        }
    }

    /// `getRecordingById` (§4.2): look up a recording, resolving the release
    /// to report via the strict release-selection precedence.
    pub async fn get_recording_by_id(
        &self,
        recording_id: &str,
        file_count: u32,
        preferred_release_group_id: Option<&str>,
        preferred_release_id: Option<&str>,
        country_priority: &[String],
    ) -> Result<MusicMetadata, EnrichmentError> {
        let url = format!(
            "{}/recording/{}?fmt=json&inc=artist-credits+releases+release-groups+media",
            self.base_url, recording_id
        );
        let response: dto::RecordingResponse = self.get(&url).await?;

        let release = select_release(
            &response.releases,
            file_count,
            preferred_release_group_id,
            preferred_release_id,
            country_priority,
        );
        Ok(adapter::recording_to_metadata(response.clone(), release))
    }

    /// `searchRelease` (§4.2): free-text release search, used when no
    /// fingerprint candidate exists.
    pub async fn search_release(&self, album: &str, artist: &str) -> Result<Vec<MusicMetadata>, EnrichmentError> {
        let query = format!("release:\"{album}\" AND artist:\"{artist}\"");
        let url = format!(
            "{}/release/?fmt=json&query={}",
            self.base_url,
            urlencoding::encode(&query)
        );
        let response: dto::ReleaseSearchResponse = self.get(&url).await?;
        Ok(response.releases.iter().map(adapter::release_to_metadata).collect())
    }

    /// `getReleaseDurationSequence` (§4.2, §4.6): the per-track duration
    /// sequence of a release group's first (or only) release, for duration
    /// matching against a folder's on-disk tracks.
    pub async fn get_release_duration_sequence(
        &self,
        release_group_id: &str,
    ) -> Result<ReleaseDurationSequence, EnrichmentError> {
        let url = format!(
            "{}/release-group/{}?fmt=json&inc=releases+artist-credits",
            self.base_url, release_group_id
        );
        let response: dto::ReleaseGroupResponse = self.get(&url).await?;
        let release = response
            .releases
            .first()
            .ok_or_else(|| EnrichmentError::NoMatches)?;

        let release_with_tracks_url = format!(
            "{}/release/{}?fmt=json&inc=recordings+artist-credits+release-groups",
            self.base_url, release.id
        );
        let full_release: dto::ReleaseWithRecordingsResponse = self.get(&release_with_tracks_url).await?;

        let durations: Vec<u32> = full_release
            .media
            .iter()
            .flat_map(|m| m.tracks.iter())
            .map(|t| {
                let ms = t.recording.as_ref().and_then(|r| r.length).or(t.length).unwrap_or(0);
                (ms / 1000) as u32
            })
            .collect();
        let track_count = durations.len() as u32;

        Ok(ReleaseDurationSequence {
            release_id: full_release.id,
            release_date: full_release.date,
            durations,
            track_count,
        })
    }

    /// `getTrackFromLockedReleaseByDuration` (§4.2): given a release already
    /// locked in for a folder, find the track whose duration best matches
    /// one observed file.
    pub async fn get_track_from_locked_release_by_duration(
        &self,
        release_id: &str,
        observed_duration_sec: u32,
        fallback_title: &str,
        fallback_artist: &str,
    ) -> Result<Option<MusicMetadata>, EnrichmentError> {
        let url = format!(
            "{}/release/{}?fmt=json&inc=recordings+artist-credits+release-groups",
            self.base_url, release_id
        );
        let release: dto::ReleaseWithRecordingsResponse = self.get(&url).await?;
        Ok(adapter::closest_track_by_duration(
            &release,
            observed_duration_sec,
            fallback_title,
            fallback_artist,
        ))
    }

    /// `getTrackFromLockedReleaseGroupByDuration` (§4.2): like the above, but
    /// starting from a release group (resolves to its first release first).
    pub async fn get_track_from_locked_release_group_by_duration(
        &self,
        release_group_id: &str,
        observed_duration_sec: u32,
        fallback_title: &str,
        fallback_artist: &str,
    ) -> Result<Option<MusicMetadata>, EnrichmentError> {
        let url = format!(
            "{}/release-group/{}?fmt=json&inc=releases+artist-credits",
            self.base_url, release_group_id
        );
        let response: dto::ReleaseGroupResponse = self.get(&url).await?;
        let Some(release) = response.releases.first() else {
            return Ok(None);
        };
        self.get_track_from_locked_release_by_duration(
            &release.id,
            observed_duration_sec,
            fallback_title,
            fallback_artist,
        )
        .await
    }

    /// Rate-limited GET with retry/backoff, deserializing the JSON body.
    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, EnrichmentError> {
        let mut attempt = 0;
        loop {
            self.limiter.acquire().await;

            let response = self
                .http_client
                .get(url)
                .send()
                .await
                .map_err(|e| EnrichmentError::Network(e.to_string()))?;

            let status = response.status();

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(EnrichmentError::NoMatches);
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
                if attempt >= self.max_retries {
                    return Err(EnrichmentError::RateLimited);
                }
                tokio::time::sleep(backoff_delay(attempt)).await;
                attempt += 1;
                continue;
            }

            if status.is_server_error() {
                if attempt >= 1 {
                    return Err(EnrichmentError::Network(format!("HTTP {status} (retried once)")));
                }
                attempt += 1;
                continue;
            }

            if !status.is_success() {
                if let Ok(error) = response.json::<dto::ApiError>().await {
                    return Err(EnrichmentError::ApiError(error.error));
                }
                return Err(EnrichmentError::ApiError(format!("HTTP {status}")));
            }

            return response.json::<T>().await.map_err(|e| EnrichmentError::Parse(e.to_string()));
        }
    }
}

impl Default for MetadataClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Duration sequence for one release, used to match folder track order
/// against a candidate release (§4.6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseDurationSequence {
    pub release_id: String,
    pub release_date: Option<String>,
    pub durations: Vec<u32>,
    pub track_count: u32,
}

/// Release-selection algorithm (§4.2), strict precedence:
///
/// 1. `preferred_release_id` exact match.
/// 2. `preferred_release_group_id` match with `trackCount == fileCount`.
/// 3. `preferred_release_group_id` match (any track count).
/// 4. First release whose country is in `country_priority`, in list order.
/// 5. Earliest `releaseDate`.
///
/// Ties at any step break on lexicographically smallest `releaseId`.
fn select_release<'a>(
    releases: &'a [dto::Release],
    file_count: u32,
    preferred_release_group_id: Option<&str>,
    preferred_release_id: Option<&str>,
    country_priority: &[String],
) -> Option<&'a dto::Release> {
    if let Some(wanted) = preferred_release_id {
        if let Some(r) = releases.iter().find(|r| r.id == wanted) {
            return Some(r);
        }
    }

    if let Some(rg_id) = preferred_release_group_id {
        let in_group: Vec<&dto::Release> = releases
            .iter()
            .filter(|r| r.release_group.as_ref().map(|g| g.id.as_str()) == Some(rg_id))
            .collect();

        if let Some(exact) = smallest_id(
            in_group
                .iter()
                .copied()
                .filter(|r| r.media.iter().map(|m| m.track_count.unwrap_or(0)).sum::<u32>() == file_count),
        ) {
            return Some(exact);
        }

        if let Some(any) = smallest_id(in_group.iter().copied()) {
            return Some(any);
        }
    }

    for country in country_priority {
        if let Some(r) = smallest_id(releases.iter().filter(|r| r.country.as_deref() == Some(country.as_str()))) {
            return Some(r);
        }
    }

    releases
        .iter()
        .filter(|r| r.date.is_some())
        .min_by(|a, b| match a.date.cmp(&b.date) {
            std::cmp::Ordering::Equal => a.id.cmp(&b.id),
            other => other,
        })
        .or_else(|| smallest_id(releases.iter()))
}

fn smallest_id<'a, I: Iterator<Item = &'a dto::Release>>(iter: I) -> Option<&'a dto::Release> {
    iter.min_by(|a, b| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(id: &str, rg_id: &str, country: Option<&str>, date: Option<&str>, track_count: u32) -> dto::Release {
        dto::Release {
            id: id.to_string(),
            title: "Album".to_string(),
            status: Some("Official".to_string()),
            date: date.map(String::from),
            country: country.map(String::from),
            release_group: Some(dto::ReleaseGroup {
                id: rg_id.to_string(),
                title: "Album".to_string(),
                primary_type: Some("Album".to_string()),
                first_release_date: None,
            }),
            media: vec![dto::Medium {
                position: Some(1),
                format: None,
                track_count: Some(track_count),
                tracks: vec![],
            }],
        }
    }

    #[test]
    fn test_client_creation() {
        let client = MetadataClient::new();
        assert_eq!(client.base_url, "https://musicbrainz.org/ws/2");
    }

    #[test]
    fn test_select_release_prefers_exact_release_id() {
        let releases = vec![
            release("rel-a", "rg-1", Some("US"), Some("2000-01-01"), 10),
            release("rel-b", "rg-1", Some("GB"), Some("1999-01-01"), 10),
        ];
        let chosen = select_release(&releases, 10, Some("rg-1"), Some("rel-b"), &[]);
        assert_eq!(chosen.unwrap().id, "rel-b");
    }

    #[test]
    fn test_select_release_prefers_matching_track_count_in_group() {
        let releases = vec![
            release("rel-a", "rg-1", None, None, 8),
            release("rel-b", "rg-1", None, None, 12),
        ];
        let chosen = select_release(&releases, 12, Some("rg-1"), None, &[]);
        assert_eq!(chosen.unwrap().id, "rel-b");
    }

    #[test]
    fn test_select_release_falls_back_to_country_priority() {
        let releases = vec![
            release("rel-a", "rg-x", Some("GB"), Some("2000-01-01"), 10),
            release("rel-b", "rg-y", Some("US"), Some("1999-01-01"), 10),
        ];
        let chosen = select_release(&releases, 10, None, None, &["US".to_string(), "GB".to_string()]);
        assert_eq!(chosen.unwrap().id, "rel-b");
    }

    #[test]
    fn test_select_release_falls_back_to_earliest_date() {
        let releases = vec![
            release("rel-a", "rg-x", None, Some("2005-01-01"), 10),
            release("rel-b", "rg-y", None, Some("1999-06-01"), 10),
        ];
        let chosen = select_release(&releases, 10, None, None, &[]);
        assert_eq!(chosen.unwrap().id, "rel-b");
    }

    #[test]
    fn test_select_release_tie_breaks_on_lexicographic_id() {
        let releases = vec![
            release("rel-z", "rg-x", None, Some("2000-01-01"), 10),
            release("rel-a", "rg-y", None, Some("2000-01-01"), 10),
        ];
        let chosen = select_release(&releases, 10, None, None, &[]);
        assert_eq!(chosen.unwrap().id, "rel-a");
    }
}
