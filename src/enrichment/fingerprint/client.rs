//! Fingerprint-registry HTTP client (AcoustID-compatible webservice).
//!
//! ## API quirks
//!
//! The `meta` parameter uses `+` as a field separator (e.g.
//! `recordings+releasegroups`). Standard URL encoding turns `+` into `%2B`,
//! which the service does not recognize as a separator — it silently drops
//! the requested metadata instead of erroring. The URL is built by hand here
//! to keep the literal `+`.
//!
//! The service's docs recommend POST for large fingerprints, but POST
//! empirically returns results without metadata even with a correct
//! Content-Type. GET works reliably and fingerprints comfortably fit in a
//! URL, so this client uses GET (see DESIGN.md for the resolution).

use std::path::Path;

use super::{adapter, dto, fpcalc, FingerprintRecording};
use crate::enrichment::EnrichmentError;

/// Client for the fingerprint registry (§4.1).
pub struct FingerprintClient {
    api_key: String,
    http_client: reqwest::Client,
    base_url: String,
}

impl FingerprintClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .gzip(true)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client");

        Self {
            api_key: api_key.into(),
            http_client,
            base_url: "https://api.acoustid.org/v2/lookup".to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            http_client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Fingerprint `path` locally, then look up the resulting fingerprint.
    ///
    /// Returns `(durationSeconds, recordings)`. A missing fpcalc binary is
    /// reported as `EnrichmentError::FingerprintError`; callers should treat
    /// that as "feature disabled" rather than a hard failure.
    pub async fn identify(
        &self,
        path: &Path,
    ) -> Result<(u32, Vec<FingerprintRecording>), EnrichmentError> {
        let raw = fpcalc::generate_fingerprint(path)?;
        let recordings = self.lookup(&raw.fingerprint, raw.duration_secs).await?;
        Ok((raw.duration_secs, recordings))
    }

    /// Look up an already-computed fingerprint.
    pub async fn lookup(
        &self,
        fingerprint: &str,
        duration_secs: u32,
    ) -> Result<Vec<FingerprintRecording>, EnrichmentError> {
        let response = self.send_lookup_request(fingerprint, duration_secs).await?;
        adapter::to_recordings(response)
    }

    async fn send_lookup_request(
        &self,
        fingerprint: &str,
        duration_secs: u32,
    ) -> Result<dto::LookupResponse, EnrichmentError> {
        // The literal '+' must survive encoding; see module docs.
        let url = format!(
            "{}?client={}&duration={}&fingerprint={}&meta=recordings+releasegroups+compress",
            self.base_url,
            urlencoding::encode(&self.api_key),
            duration_secs,
            urlencoding::encode(fingerprint)
        );

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| EnrichmentError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EnrichmentError::Network(format!(
                "HTTP {}: {} - {}",
                status,
                status.canonical_reason().unwrap_or("unknown"),
                body.chars().take(200).collect::<String>()
            )));
        }

        response
            .json::<dto::LookupResponse>()
            .await
            .map_err(|e| EnrichmentError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = FingerprintClient::new("test-key");
        assert_eq!(client.api_key, "test-key");
        assert_eq!(client.base_url, "https://api.acoustid.org/v2/lookup");
    }

    #[test]
    fn test_client_with_custom_url() {
        let client = FingerprintClient::with_base_url("key", "http://localhost:8080");
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[tokio::test]
    async fn test_lookup_against_mock_server() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/lookup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ok",
                "results": [{
                    "id": "aid-1",
                    "score": 0.95,
                    "recordings": [{
                        "id": "rec-1",
                        "title": "Track",
                        "duration": 200.0,
                        "artists": [{"id": "art-1", "name": "Artist"}],
                        "releasegroups": [{"id": "rg-1", "title": "Album", "type": "Album"}]
                    }]
                }]
            })))
            .mount(&server)
            .await;

        let client = FingerprintClient::with_base_url("key", format!("{}/v2/lookup", server.uri()));
        let recordings = client.lookup("fakefingerprint", 200).await.unwrap();
        assert_eq!(recordings.len(), 1);
        assert_eq!(recordings[0].recording_id, "rec-1");
        assert_eq!(recordings[0].release_groups[0].id, "rg-1");
    }
}
