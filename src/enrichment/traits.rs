//! Trait definitions for external API clients.
//!
//! These traits enable dependency injection and mocking for tests.
//! Production code uses the real client implementations, while tests
//! can substitute mock implementations.

use std::path::Path;

use async_trait::async_trait;

use super::cover::{CoverArt, CoverSize};
use super::fingerprint::FingerprintRecording;
use super::metadata::ReleaseDurationSequence;
use super::EnrichmentError;
use crate::model::MusicMetadata;

#[async_trait]
pub trait FingerprintLookup: Send + Sync {
    async fn identify(&self, path: &Path) -> Result<(u32, Vec<FingerprintRecording>), EnrichmentError>;
}

#[async_trait]
pub trait MetadataLookup: Send + Sync {
    async fn get_recording_by_id(
        &self,
        recording_id: &str,
        file_count: u32,
        preferred_release_group_id: Option<&str>,
        preferred_release_id: Option<&str>,
        country_priority: &[String],
    ) -> Result<MusicMetadata, EnrichmentError>;

    async fn search_release(&self, album: &str, artist: &str) -> Result<Vec<MusicMetadata>, EnrichmentError>;

    async fn get_release_duration_sequence(
        &self,
        release_group_id: &str,
    ) -> Result<ReleaseDurationSequence, EnrichmentError>;

    async fn get_track_from_locked_release_by_duration(
        &self,
        release_id: &str,
        observed_duration_sec: u32,
        fallback_title: &str,
        fallback_artist: &str,
    ) -> Result<Option<MusicMetadata>, EnrichmentError>;

    async fn get_track_from_locked_release_group_by_duration(
        &self,
        release_group_id: &str,
        observed_duration_sec: u32,
        fallback_title: &str,
        fallback_artist: &str,
    ) -> Result<Option<MusicMetadata>, EnrichmentError>;
}

#[async_trait]
pub trait CoverLookup: Send + Sync {
    async fn get_cover(
        &self,
        folder: &Path,
        sibling_audio_file: Option<&Path>,
        release_group_id: Option<&str>,
    ) -> Result<Option<Vec<u8>>, EnrichmentError>;
}

#[async_trait]
pub trait LyricsLookup: Send + Sync {
    async fn get_lyrics(&self, title: &str, artist: &str, album: &str, duration_secs: u32) -> Option<String>;
}

#[async_trait]
impl FingerprintLookup for super::FingerprintClient {
    async fn identify(&self, path: &Path) -> Result<(u32, Vec<FingerprintRecording>), EnrichmentError> {
        self.identify(path).await
    }
}

#[async_trait]
impl MetadataLookup for super::MetadataClient {
    async fn get_recording_by_id(
        &self,
        recording_id: &str,
        file_count: u32,
        preferred_release_group_id: Option<&str>,
        preferred_release_id: Option<&str>,
        country_priority: &[String],
    ) -> Result<MusicMetadata, EnrichmentError> {
        self.get_recording_by_id(
            recording_id,
            file_count,
            preferred_release_group_id,
            preferred_release_id,
            country_priority,
        )
        .await
    }

    async fn search_release(&self, album: &str, artist: &str) -> Result<Vec<MusicMetadata>, EnrichmentError> {
        self.search_release(album, artist).await
    }

    async fn get_release_duration_sequence(
        &self,
        release_group_id: &str,
    ) -> Result<ReleaseDurationSequence, EnrichmentError> {
        self.get_release_duration_sequence(release_group_id).await
    }

    async fn get_track_from_locked_release_by_duration(
        &self,
        release_id: &str,
        observed_duration_sec: u32,
        fallback_title: &str,
        fallback_artist: &str,
    ) -> Result<Option<MusicMetadata>, EnrichmentError> {
        self.get_track_from_locked_release_by_duration(release_id, observed_duration_sec, fallback_title, fallback_artist)
            .await
    }

    async fn get_track_from_locked_release_group_by_duration(
        &self,
        release_group_id: &str,
        observed_duration_sec: u32,
        fallback_title: &str,
        fallback_artist: &str,
    ) -> Result<Option<MusicMetadata>, EnrichmentError> {
        self.get_track_from_locked_release_group_by_duration(
            release_group_id,
            observed_duration_sec,
            fallback_title,
            fallback_artist,
        )
        .await
    }
}

#[async_trait]
impl CoverLookup for super::CoverClient {
    async fn get_cover(
        &self,
        folder: &Path,
        sibling_audio_file: Option<&Path>,
        release_group_id: Option<&str>,
    ) -> Result<Option<Vec<u8>>, EnrichmentError> {
        self.get_cover(folder, sibling_audio_file, release_group_id).await
    }
}

#[async_trait]
impl LyricsLookup for super::LyricsClient {
    async fn get_lyrics(&self, title: &str, artist: &str, album: &str, duration_secs: u32) -> Option<String> {
        self.get_lyrics(title, artist, album, duration_secs).await
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;

    pub struct MockFingerprint {
        pub recordings: Vec<FingerprintRecording>,
        pub duration_secs: u32,
        pub error: Option<EnrichmentError>,
    }

    #[async_trait]
    impl FingerprintLookup for MockFingerprint {
        async fn identify(&self, _path: &Path) -> Result<(u32, Vec<FingerprintRecording>), EnrichmentError> {
            if let Some(ref err) = self.error {
                return Err(clone_error(err));
            }
            Ok((self.duration_secs, self.recordings.clone()))
        }
    }

    pub struct MockMetadata {
        pub recording: Option<MusicMetadata>,
        pub search_results: Vec<MusicMetadata>,
        pub duration_sequence: Option<ReleaseDurationSequence>,
        pub error: Option<EnrichmentError>,
    }

    #[async_trait]
    impl MetadataLookup for MockMetadata {
        async fn get_recording_by_id(
            &self,
            _recording_id: &str,
            _file_count: u32,
            _preferred_release_group_id: Option<&str>,
            _preferred_release_id: Option<&str>,
            _country_priority: &[String],
        ) -> Result<MusicMetadata, EnrichmentError> {
            if let Some(ref err) = self.error {
                return Err(clone_error(err));
            }
            self.recording.clone().ok_or(EnrichmentError::NoMatches)
        }

        async fn search_release(&self, _album: &str, _artist: &str) -> Result<Vec<MusicMetadata>, EnrichmentError> {
            if let Some(ref err) = self.error {
                return Err(clone_error(err));
            }
            Ok(self.search_results.clone())
        }

        async fn get_release_duration_sequence(
            &self,
            _release_group_id: &str,
        ) -> Result<ReleaseDurationSequence, EnrichmentError> {
            if let Some(ref err) = self.error {
                return Err(clone_error(err));
            }
            self.duration_sequence.clone().ok_or(EnrichmentError::NoMatches)
        }

        async fn get_track_from_locked_release_by_duration(
            &self,
            _release_id: &str,
            _observed_duration_sec: u32,
            _fallback_title: &str,
            _fallback_artist: &str,
        ) -> Result<Option<MusicMetadata>, EnrichmentError> {
            if let Some(ref err) = self.error {
                return Err(clone_error(err));
            }
            Ok(self.recording.clone())
        }

        async fn get_track_from_locked_release_group_by_duration(
            &self,
            _release_group_id: &str,
            _observed_duration_sec: u32,
            _fallback_title: &str,
            _fallback_artist: &str,
        ) -> Result<Option<MusicMetadata>, EnrichmentError> {
            if let Some(ref err) = self.error {
                return Err(clone_error(err));
            }
            Ok(self.recording.clone())
        }
    }

    pub struct MockCover {
        pub bytes: Option<Vec<u8>>,
        pub error: Option<EnrichmentError>,
    }

    #[async_trait]
    impl CoverLookup for MockCover {
        async fn get_cover(
            &self,
            _folder: &Path,
            _sibling_audio_file: Option<&Path>,
            _release_group_id: Option<&str>,
        ) -> Result<Option<Vec<u8>>, EnrichmentError> {
            if let Some(ref err) = self.error {
                return Err(clone_error(err));
            }
            Ok(self.bytes.clone())
        }
    }

    pub struct MockLyrics {
        pub lyrics: Option<String>,
    }

    #[async_trait]
    impl LyricsLookup for MockLyrics {
        async fn get_lyrics(&self, _title: &str, _artist: &str, _album: &str, _duration_secs: u32) -> Option<String> {
            self.lyrics.clone()
        }
    }

    fn clone_error(err: &EnrichmentError) -> EnrichmentError {
        match err {
            EnrichmentError::FingerprintError(s) => EnrichmentError::FingerprintError(s.clone()),
            EnrichmentError::ApiError(s) => EnrichmentError::ApiError(s.clone()),
            EnrichmentError::Network(s) => EnrichmentError::Network(s.clone()),
            EnrichmentError::Parse(s) => EnrichmentError::Parse(s.clone()),
            EnrichmentError::NoMatches => EnrichmentError::NoMatches,
            EnrichmentError::RateLimited => EnrichmentError::RateLimited,
            EnrichmentError::InvalidResponse(s) => EnrichmentError::InvalidResponse(s.clone()),
            EnrichmentError::ContractViolation { expected, actual } => EnrichmentError::ContractViolation {
                expected: expected.clone(),
                actual: actual.clone(),
            },
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_metadata_no_matches() {
            let mock = MockMetadata {
                recording: None,
                search_results: vec![],
                duration_sequence: None,
                error: None,
            };
            let result = mock.get_recording_by_id("rec-1", 10, None, None, &[]).await;
            assert!(matches!(result, Err(EnrichmentError::NoMatches)));
        }

        #[tokio::test]
        async fn test_mock_cover_returns_configured_bytes() {
            let mock = MockCover {
                bytes: Some(vec![1, 2, 3]),
                error: None,
            };
            let result = mock.get_cover(Path::new("/x"), None, None).await.unwrap();
            assert_eq!(result, Some(vec![1, 2, 3]));
        }

        #[tokio::test]
        async fn test_mock_lyrics_passthrough() {
            let mock = MockLyrics {
                lyrics: Some("la la".to_string()),
            };
            let result = mock.get_lyrics("t", "a", "al", 100).await;
            assert_eq!(result.as_deref(), Some("la la"));
        }
    }
}
