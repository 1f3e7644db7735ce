//! MusicBrainz API Data Transfer Objects
//!
//! These types match EXACTLY what the MusicBrainz API returns.
//! DO NOT add fields that aren't in the API response.
//! DO NOT use these types outside the musicbrainz module - convert to domain types.
//!
//! API Reference: https://musicbrainz.org/doc/MusicBrainz_API
//!
//! We primarily use the /recording endpoint to look up recordings by MBID
//! (obtained from AcoustID) and get full metadata.

use serde::{Deserialize, Serialize};

/// Recording lookup response (single recording with includes)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RecordingResponse {
    /// MusicBrainz recording ID
    pub id: String,
    /// Track title
    pub title: String,
    /// Duration in milliseconds
    pub length: Option<u64>,
    /// Disambiguation comment
    pub disambiguation: Option<String>,
    /// Artist credits
    #[serde(default)]
    pub artist_credit: Vec<ArtistCredit>,
    /// Releases this recording appears on
    #[serde(default)]
    pub releases: Vec<Release>,
}

/// Artist credit (can be multiple for collaborations)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtistCredit {
    /// The artist
    pub artist: Artist,
    /// How this artist is credited (may differ from official name)
    pub name: Option<String>,
    /// Join phrase (e.g., " & ", " feat. ")
    pub joinphrase: Option<String>,
}

/// Artist info
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Artist {
    /// MusicBrainz artist ID
    pub id: String,
    /// Official artist name
    pub name: String,
    /// Sort name (e.g., "Beatles, The")
    pub sort_name: Option<String>,
    /// Artist type (Person, Group, etc.)
    #[serde(rename = "type")]
    pub artist_type: Option<String>,
}

/// Release (album/single/EP)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Release {
    /// MusicBrainz release ID
    pub id: String,
    /// Release title
    pub title: String,
    /// Release status (Official, Bootleg, etc.)
    pub status: Option<String>,
    /// Release date (YYYY, YYYY-MM, or YYYY-MM-DD)
    pub date: Option<String>,
    /// Country code
    pub country: Option<String>,
    /// Release group (groups same album across editions)
    pub release_group: Option<ReleaseGroup>,
    /// Media (discs) in this release
    #[serde(default)]
    pub media: Vec<Medium>,
}

/// Release group (e.g., "Abbey Road" across all editions)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReleaseGroup {
    /// MusicBrainz release group ID
    pub id: String,
    /// Title
    pub title: String,
    /// Primary type (Album, Single, EP, etc.)
    pub primary_type: Option<String>,
    /// First release date
    pub first_release_date: Option<String>,
}

/// Medium (disc) within a release
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Medium {
    /// Position in release (disc number)
    pub position: Option<u32>,
    /// Format (CD, Vinyl, Digital, etc.)
    pub format: Option<String>,
    /// Number of tracks
    pub track_count: Option<u32>,
    /// Tracks on this medium
    #[serde(default)]
    pub tracks: Vec<Track>,
}

/// Track on a medium
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Track {
    /// Track position on medium
    pub position: Option<u32>,
    /// Track number (may include disc prefix like "1-5")
    pub number: Option<String>,
    /// Track title (may differ from recording title)
    pub title: Option<String>,
    /// Track length in milliseconds
    pub length: Option<u64>,
    /// The underlying recording, present when the release was fetched with
    /// `inc=recordings`
    pub recording: Option<RecordingRef>,
}

/// Minimal recording reference nested under a release's track listing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecordingRef {
    pub id: String,
    pub title: Option<String>,
    pub length: Option<u64>,
}

/// `GET /ws/2/release-group/{id}?inc=releases+artist-credits` response.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReleaseGroupResponse {
    pub id: String,
    pub title: String,
    pub primary_type: Option<String>,
    pub first_release_date: Option<String>,
    #[serde(default)]
    pub artist_credit: Vec<ArtistCredit>,
    #[serde(default)]
    pub releases: Vec<Release>,
}

/// `GET /ws/2/release/{id}?inc=recordings+artist-credits` response. Reuses
/// [`Release`] since the shape is identical other than `media[].tracks[]`
/// carrying full recording refs when `inc=recordings` is requested.
pub type ReleaseWithRecordingsResponse = Release;

/// `GET /ws/2/release/?query=...` search response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReleaseSearchResponse {
    #[serde(default)]
    pub releases: Vec<Release>,
}

/// Error response from MusicBrainz API
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiError {
    pub error: String,
    pub help: Option<String>,
}

// ============================================================================
// CONTRACT TESTS
// These verify our DTOs match what the real API returns.
// If these fail, the API has changed and we need to update our DTOs.
// ============================================================================
