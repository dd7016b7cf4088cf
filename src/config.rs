//! Configuration file parser for `subnet-hub.toml`.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration
// ============================================================================

/// Build and fetch settings.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory the build writes `feed.xml`, `subnet.opml` and `subnet.json` into.
    pub output_dir: PathBuf,

    /// Identifying client label sent on every outbound request.
    pub user_agent: String,

    /// Timeout for HTML pages and peer manifests, in seconds.
    pub page_timeout_secs: u64,

    /// Timeout for feed documents, in seconds.
    pub feed_timeout_secs: u64,

    /// Upper bound on simultaneous outbound requests. 1 = strictly sequential.
    pub max_concurrent_fetches: usize,

    /// Response bodies larger than this are treated as a failed fetch.
    pub max_response_bytes: usize,

    /// SQLite file backing the widget's hub cache.
    pub cache_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("_site"),
            user_agent: "subnet-hub/1.0".to_string(),
            page_timeout_secs: 10,
            feed_timeout_secs: 15,
            max_concurrent_fetches: 8,
            max_response_bytes: 10 * 1024 * 1024,
            cache_path: PathBuf::from("subnet-cache.db"),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 7] = [
        "output_dir",
        "user_agent",
        "page_timeout_secs",
        "feed_timeout_secs",
        "max_concurrent_fetches",
        "max_response_bytes",
        "cache_path",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text, applying the same rules as [`Config::load`].
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!("Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let mut config: Config = toml::from_str(content)?;
        // Zero would stall the fetch stream.
        config.max_concurrent_fetches = config.max_concurrent_fetches.max(1);
        tracing::info!(
            output_dir = %config.output_dir.display(),
            concurrency = config.max_concurrent_fetches,
            "Loaded configuration"
        );
        Ok(config)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.output_dir, PathBuf::from("_site"));
        assert_eq!(config.user_agent, "subnet-hub/1.0");
        assert_eq!(config.page_timeout_secs, 10);
        assert_eq!(config.feed_timeout_secs, 15);
        assert_eq!(config.max_concurrent_fetches, 8);
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/subnet_hub_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.feed_timeout_secs, 15);
    }

    #[test]
    fn test_empty_file_returns_default() {
        let dir = std::env::temp_dir().join("subnet_hub_config_test_empty");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("subnet-hub.toml");
        std::fs::write(&path, "   \n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.user_agent, "subnet-hub/1.0");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let config = Config::from_toml("feed_timeout_secs = 30\noutput_dir = \"public\"\n").unwrap();
        assert_eq!(config.feed_timeout_secs, 30);
        assert_eq!(config.output_dir, PathBuf::from("public"));
        assert_eq!(config.page_timeout_secs, 10);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Config::from_toml("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_wrong_type_returns_error() {
        assert!(Config::from_toml("page_timeout_secs = \"ten\"\n").is_err());
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let config = Config::from_toml("user_agent = \"x/2\"\ntotally_fake_key = 1\n").unwrap();
        assert_eq!(config.user_agent, "x/2");
    }

    #[test]
    fn test_zero_concurrency_clamped() {
        let config = Config::from_toml("max_concurrent_fetches = 0\n").unwrap();
        assert_eq!(config.max_concurrent_fetches, 1);
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("subnet_hub_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("subnet-hub.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));

        std::fs::remove_dir_all(&dir).ok();
    }
}
