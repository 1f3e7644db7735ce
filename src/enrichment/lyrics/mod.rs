//! Best-effort lyrics lookup (§4.4).
//!
//! Unlike the fingerprint and metadata registries, a missing or unreachable
//! lyrics service is never fatal to processing a file: any failure collapses
//! to `None` rather than an error, since lyrics are cosmetic metadata.

mod dto;

use std::time::Duration;

/// Client for a free-text lyrics lookup service.
pub struct LyricsClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl LyricsClient {
    pub fn new() -> Self {
        Self::with_base_url("https://lrclib.net/api")
    }

    #[cfg(test)]
    pub fn with_base_url_for_test(base_url: impl Into<String>) -> Self {
        Self::with_base_url(base_url)
    }

    fn with_base_url(base_url: impl Into<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http_client,
            base_url: base_url.into(),
        }
    }

    /// `getLyrics` (§4.4): returns `None` on any network error, non-success
    /// status, or missing-field response, since lyrics are best-effort.
    pub async fn get_lyrics(&self, title: &str, artist: &str, album: &str, duration_secs: u32) -> Option<String> {
        let url = format!(
            "{}/get?track_name={}&artist_name={}&album_name={}&duration={}",
            self.base_url,
            urlencoding::encode(title),
            urlencoding::encode(artist),
            urlencoding::encode(album),
            duration_secs
        );

        let response = self.http_client.get(&url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        let body: dto::LyricsResponse = response.json().await.ok()?;
        body.plain_lyrics.or(body.synced_lyrics)
    }
}

impl Default for LyricsClient {
    fn default() -> Self {
        Self::new()
    }
}
