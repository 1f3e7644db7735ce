//! Cover art disk cache, keyed by the MD5 hash of the source URL (§4.3).
//!
//! Each cached image lives at `<cache_dir>/<md5hex>.<ext>`. The in-memory
//! `CoverCache` only manages the files; the `(url_hash, url, path, size,
//! cached_at)` row lives in `ProcessedLog`'s relational backend and is
//! populated by the caller after a successful `put`.

use std::fs;
use std::path::PathBuf;

use md5::{Digest, Md5};

/// Disk cache for remote cover art, keyed by MD5(url).
pub struct CoverCache {
    cache_dir: PathBuf,
}

impl CoverCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        let cache_dir = cache_dir.into();
        let _ = fs::create_dir_all(&cache_dir);
        Self { cache_dir }
    }

    pub fn default_location() -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("crate-minder")
            .join("covers");
        Self::new(cache_dir)
    }

    /// MD5(url) as a lowercase hex string, the cache key (§4.3).
    pub fn url_hash(url: &str) -> String {
        let mut hasher = Md5::new();
        hasher.update(url.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Fetch cached bytes for `url`, if present. Never touches the network.
    pub fn get(&self, url: &str) -> Option<Vec<u8>> {
        let path = self.cache_path(url)?;
        fs::read(&path).ok()
    }

    /// Store `bytes` under `url`'s hash, inferring an extension from
    /// `mime_type`. Returns the path written, for the caller to record in
    /// the relational `cover_art_cache` table.
    pub fn put(&self, url: &str, bytes: &[u8], mime_type: &str) -> std::io::Result<PathBuf> {
        let ext = if mime_type.contains("png") { "png" } else { "jpg" };
        let path = self.cache_dir.join(format!("{}.{ext}", Self::url_hash(url)));
        fs::write(&path, bytes)?;
        Ok(path)
    }

    fn cache_path(&self, url: &str) -> Option<PathBuf> {
        let hash = Self::url_hash(url);
        for ext in ["jpg", "png"] {
            let path = self.cache_dir.join(format!("{hash}.{ext}"));
            if path.exists() {
                return Some(path);
            }
        }
        None
    }
}
