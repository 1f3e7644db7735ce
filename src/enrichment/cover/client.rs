//! Remote cover art fetch (Cover Art Archive-compatible service) plus the
//! full local/remote fallback chain from §4.3.

use std::path::Path;

use super::dto;
use super::CoverCache;
use crate::enrichment::EnrichmentError;
use crate::tagio;

/// Desired cover art size for the remote fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoverSize {
    Small,
    #[default]
    Medium,
    Large,
    Original,
}

/// Downloaded or cached cover art.
#[derive(Debug, Clone)]
pub struct CoverArt {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub url: String,
}

/// Resolves cover art for a folder, trying embedded art, a folder image,
/// then the remote archive, in that order (§4.3).
pub struct CoverClient {
    http_client: reqwest::Client,
    base_url: String,
    cache: CoverCache,
}

impl CoverClient {
    pub fn new(cache: CoverCache) -> Self {
        Self::with_base_url("https://coverartarchive.org", cache)
    }

    #[cfg(test)]
    pub fn with_base_url_for_test(base_url: impl Into<String>, cache: CoverCache) -> Self {
        Self::with_base_url(base_url, cache)
    }

    fn with_base_url(base_url: impl Into<String>, cache: CoverCache) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into(),
            cache,
        }
    }

    /// `getCover(releaseGroupId) -> bytes?` (§4.3).
    ///
    /// Tries, in order: a sibling file's embedded art, a folder-level image
    /// file, then the remote archive keyed by `release_group_id`.
    pub async fn get_cover(
        &self,
        folder: &Path,
        sibling_audio_file: Option<&Path>,
        release_group_id: Option<&str>,
    ) -> Result<Option<Vec<u8>>, EnrichmentError> {
        if let Some(audio_file) = sibling_audio_file {
            if let Ok(Some(bytes)) = tagio::extract_embedded_cover(audio_file) {
                return Ok(Some(bytes));
            }
        }

        if let Some(image_path) = tagio::find_folder_cover_image(folder) {
            if let Ok(bytes) = std::fs::read(&image_path) {
                return Ok(Some(bytes));
            }
        }

        let Some(rg_id) = release_group_id else {
            return Ok(None);
        };

        match self.get_front_cover_by_release_group(rg_id, CoverSize::Medium).await {
            Ok(art) => Ok(Some(art.data)),
            Err(EnrichmentError::NoMatches) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetch the front cover for a release group, checking the disk cache
    /// before hitting the network.
    pub async fn get_front_cover_by_release_group(
        &self,
        release_group_id: &str,
        size: CoverSize,
    ) -> Result<CoverArt, EnrichmentError> {
        let size_suffix = match size {
            CoverSize::Small => "-250",
            CoverSize::Medium => "-500",
            CoverSize::Large => "-1200",
            CoverSize::Original => "",
        };
        let url = format!("{}/release-group/{}/front{}", self.base_url, release_group_id, size_suffix);

        if let Some(data) = self.cache.get(&url) {
            return Ok(CoverArt {
                data,
                mime_type: "image/jpeg".to_string(),
                url,
            });
        }

        let art = self.download_image(&url).await?;
        let _ = self.cache.put(&url, &art.data, &art.mime_type);
        Ok(art)
    }

    /// List all cover art metadata for a release (used by diagnostics).
    pub async fn list_cover_art(&self, release_id: &str) -> Result<dto::CoverArtResponse, EnrichmentError> {
        let url = format!("{}/release/{}", self.base_url, release_id);

        let response = self
            .http_client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| EnrichmentError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(EnrichmentError::NoMatches);
        }
        if !status.is_success() {
            return Err(EnrichmentError::Network(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("unknown")
            )));
        }

        response
            .json::<dto::CoverArtResponse>()
            .await
            .map_err(|e| EnrichmentError::Parse(e.to_string()))
    }

    async fn download_image(&self, url: &str) -> Result<CoverArt, EnrichmentError> {
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
        if !status.is_success() {
            return Err(EnrichmentError::Network(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("unknown")
            )));
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();

        let data = response
            .bytes()
            .await
            .map_err(|e| EnrichmentError::Network(e.to_string()))?
            .to_vec();

        Ok(CoverArt {
            data,
            mime_type,
            url: url.to_string(),
        })
    }
}
