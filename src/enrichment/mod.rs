//! External metadata enrichment: fingerprint lookup, recording/release
//! metadata, cover art, and lyrics.
//!
//! # Architecture
//!
//! Each external collaborator gets its own submodule with the same shape:
//! - `dto` - exact wire-format types, never used outside the submodule
//! - `adapter` - converts DTOs into [`crate::model::MusicMetadata`] and friends
//! - `client` - the HTTP client, rate-limited and retried per host
//!
//! This decoupling means a registry's response shape can change without
//! rippling through the identification pipeline, and each contract can be
//! tested independently of the others.

pub mod cover;
pub mod fingerprint;
pub mod lyrics;
pub mod metadata;
pub mod traits;

pub use cover::CoverClient;
pub use fingerprint::FingerprintClient;
pub use lyrics::LyricsClient;
pub use metadata::MetadataClient;

/// Errors raised by any enrichment collaborator.
#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    #[error("failed to generate fingerprint: {0}")]
    FingerprintError(String),

    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("no matches found")]
    NoMatches,

    #[error("rate limited - try again later")]
    RateLimited,

    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    #[error("API contract violation: expected {expected}, got {actual}")]
    ContractViolation { expected: String, actual: String },
}
