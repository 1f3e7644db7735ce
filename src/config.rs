//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\crate-minder\config.toml
//! - macOS: ~/Library/Application Support/crate-minder/config.toml
//! - Linux: ~/.config/crate-minder/config.toml
//!
//! The config file is human-readable and editable. It is loaded once at
//! startup into an injectable record (§9 "Singleton config") — there is no
//! process-global mutable config; callers pass `&Config` down explicitly.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API credentials for the external identification services.
    pub credentials: Credentials,

    /// Filesystem layout: watch roots and output/failed/partial directories.
    pub library: LibraryConfig,

    /// Rate limiting, retries, and scan cadence.
    pub tuning: TuningConfig,

    /// Where `ProcessedLog` durably records handled paths.
    pub processed_log: ProcessedLogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            library: LibraryConfig::default(),
            tuning: TuningConfig::default(),
            processed_log: ProcessedLogConfig::default(),
        }
    }
}

/// API credentials (kept separate for potential future encryption).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// AcoustID API key for fingerprint lookups.
    pub acoustid_api_key: Option<String>,
    /// User-Agent string sent to the metadata registry and lyrics service.
    /// MusicBrainz rejects requests without an identifying, contactable UA.
    pub user_agent: Option<String>,
}

/// Filesystem layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Directories watched for new audio files.
    pub watch_roots: Vec<PathBuf>,
    /// Root of the organized output library.
    pub output_dir: PathBuf,
    /// Root where permanently-failed files/album-roots are copied.
    pub failed_dir: PathBuf,
    /// Root where partially-recognized files are copied (§6).
    pub partial_dir: PathBuf,
    /// Supported audio extensions (case-insensitive, no leading dot).
    pub extensions: Vec<String>,
    /// Country priority list for release selection (§4.2), e.g. ["JP","US","GB","XW"].
    pub country_priority: Vec<String>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            watch_roots: Vec::new(),
            output_dir: PathBuf::from("./library"),
            failed_dir: PathBuf::from("./failed"),
            partial_dir: PathBuf::from("./partial"),
            extensions: vec!["mp3", "flac", "m4a", "ogg", "wav"]
                .into_iter()
                .map(String::from)
                .collect(),
            country_priority: vec!["US".to_string(), "GB".to_string(), "XW".to_string()],
        }
    }
}

/// Scheduling, rate-limit, and retry tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    /// Seconds between `DirectoryMonitor` scan passes (§4.12).
    pub scan_interval_secs: u64,
    /// Per-file retry budget for `NETWORK_ERROR_RETRY` outcomes (§4.12, §7).
    pub max_retries: u32,
    /// Size of the worker pool consuming the ingress queue (§5). `None` = CPU core count.
    pub worker_pool_size: Option<usize>,
    /// Minimum queued samples sharing a release-group before a majority vote
    /// can elect it (§4.10), default 3.
    pub vote_sample_size: usize,
    /// DurationMatcher high-confidence threshold (§4.6), default 0.90.
    pub duration_match_threshold: f32,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: 30,
            max_retries: 5,
            worker_pool_size: None,
            vote_sample_size: 3,
            duration_match_threshold: 0.90,
        }
    }
}

/// Which [`crate::processed_log::ProcessedLog`] backend to use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessedLogConfig {
    pub backend: ProcessedLogBackend,
    /// Path to the CSV file (file backend) or SQLite database (relational backend).
    pub path: PathBuf,
}

impl Default for ProcessedLogConfig {
    fn default() -> Self {
        Self {
            backend: ProcessedLogBackend::File,
            path: PathBuf::from("./processed.csv"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessedLogBackend {
    #[default]
    File,
    Relational,
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("crate-minder"))
}

/// Get the full path to the config file.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from disk.
///
/// Returns default config if the file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail — callers always get a usable config.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Config::default();
    };

    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to disk. Creates the config directory if needed.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    let dir = config_dir().ok_or(ConfigError::NoConfigDir)?;
    let path = dir.join("config.toml");

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::CreateDir(dir.clone(), e))?;

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write atomically: temp file + rename, same pattern as TagIO's atomic write.
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, &path)
        .map_err(|e| ConfigError::Rename(temp_path, path.clone(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[credentials]"));
        assert!(toml.contains("[library]"));
        assert!(toml.contains("[tuning]"));
        assert!(toml.contains("[processed_log]"));
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.credentials.acoustid_api_key = Some("test-key-123".to_string());
        config.tuning.max_retries = 10;
        config.library.watch_roots.push(PathBuf::from("/downloads"));

        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();

        assert_eq!(
            parsed.credentials.acoustid_api_key,
            Some("test-key-123".to_string())
        );
        assert_eq!(parsed.tuning.max_retries, 10);
        assert_eq!(parsed.library.watch_roots, vec![PathBuf::from("/downloads")]);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml = r#"
[credentials]
acoustid_api_key = "my-key"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.credentials.acoustid_api_key, Some("my-key".to_string()));
        assert_eq!(config.tuning.scan_interval_secs, 30);
        assert_eq!(config.tuning.duration_match_threshold, 0.90);
        assert!(config.library.watch_roots.is_empty());
    }

    #[test]
    fn test_processed_log_backend_parses() {
        let toml = r#"
[processed_log]
backend = "relational"
path = "processed.db"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.processed_log.backend, ProcessedLogBackend::Relational);
    }
}
