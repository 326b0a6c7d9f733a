//! Configuration file parser for `cctray-monitor.toml`.
//!
//! The config file is optional; a missing file yields `Config::default()`,
//! which has no feeds. Unknown keys are ignored by serde but logged as
//! warnings, since they are usually typos.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::feed::{AggregatorOptions, FeedConfig};

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
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
///
/// Debug output goes through [`FeedConfig`]'s redacting impl, so feed URL
/// credentials never reach logs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// CCTray sources, polled in this order.
    pub feeds: Vec<FeedConfig>,

    /// Per-feed request timeout in seconds.
    pub fetch_timeout_secs: u64,

    /// Maximum number of feeds fetched at once.
    pub max_concurrent_fetches: usize,

    /// Seconds between passes in watch mode.
    pub refresh_interval_secs: u64,

    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,

    /// Log each parsed project at debug level.
    pub debug: bool,

    /// Status color table keyed by lowercase status name.
    pub colors: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feeds: Vec::new(),
            fetch_timeout_secs: 10,
            max_concurrent_fetches: 8,
            refresh_interval_secs: 5,
            log_level: "warn".to_string(),
            debug: false,
            colors: default_colors(),
        }
    }
}

fn default_colors() -> BTreeMap<String, String> {
    [
        ("success", "#4CAF50"),
        ("failure", "#f44336"),
        ("exception", "#ff9800"),
        ("unknown", "#9e9e9e"),
        ("building", "#2196F3"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Display-facing settings derived from the config: the refresh cadence
/// and how colors map onto CCTray `lastBuildStatus` values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplaySettings {
    /// Refresh interval in milliseconds.
    pub refresh_interval: u64,
    pub colors: BTreeMap<String, String>,
    pub status_mapping: BTreeMap<String, String>,
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 7] = [
        "feeds",
        "fetch_timeout_secs",
        "max_concurrent_fetches",
        "refresh_interval_secs",
        "log_level",
        "debug",
        "colors",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to avoid loading a huge or corrupted file
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

        Self::parse(&content)
    }

    /// Parse configuration from TOML text. Blank text yields the defaults.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
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

        let config: Config = toml::from_str(content)?;
        tracing::info!(feeds = config.feeds.len(), "Loaded configuration");
        Ok(config)
    }

    /// Pipeline options taken from this config.
    pub fn aggregator_options(&self) -> AggregatorOptions {
        AggregatorOptions {
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            max_concurrent_fetches: self.max_concurrent_fetches.max(1),
            log_projects: self.debug,
        }
    }

    /// Maps each color key to the CCTray status name it colors.
    ///
    /// The five standard keys map to their CCTray spelling; any other key
    /// maps to itself with the first letter uppercased.
    pub fn status_mapping(&self) -> BTreeMap<String, String> {
        self.colors
            .keys()
            .map(|key| {
                let status = match key.as_str() {
                    "success" => "Success".to_string(),
                    "failure" => "Failure".to_string(),
                    "exception" => "Exception".to_string(),
                    "unknown" => "Unknown".to_string(),
                    "building" => "Building".to_string(),
                    other => capitalize(other),
                };
                (key.clone(), status)
            })
            .collect()
    }

    pub fn display_settings(&self) -> DisplaySettings {
        DisplaySettings {
            refresh_interval: self.refresh_interval_secs.saturating_mul(1000),
            colors: self.colors.clone(),
            status_mapping: self.status_mapping(),
        }
    }
}

/// Uppercases the first character and lowercases the rest.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

// ============================================================================
// Tests
// ============================================================================
