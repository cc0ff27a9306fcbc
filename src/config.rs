//! Configuration file parser for ~/.config/relwatch/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`,
//! though the watcher cannot start without `feed_url` and `webhook_url`
//! coming from somewhere (file or environment). Unknown keys are silently
//! ignored by serde, though we log a warning when the file contains
//! potential typos.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::watch::DEFAULT_INTERVAL_SECS;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Struct
// ============================================================================

/// Top-level worker configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
///
/// The custom `Debug` impl masks `webhook_url`: Slack webhook URLs embed a
/// credential and must not leak into logs or error messages.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Atom feed to watch, e.g. `https://github.com/octocat/Hello-World/releases.atom`.
    pub feed_url: Option<String>,

    /// Slack incoming webhook endpoint (alternative to RELWATCH_WEBHOOK_URL
    /// env var; the env var takes precedence over the config file).
    pub webhook_url: Option<String>,

    /// Channel the notification is posted to, e.g. `#releases`.
    pub channel: Option<String>,

    /// Username the notification is posted under.
    pub username: Option<String>,

    /// Icon emoji code, with or without the surrounding colons.
    pub icon_emoji: Option<String>,

    /// Seconds between poll cycles. Clamped to 500–86400 at scheduler start.
    pub interval_seconds: u64,

    /// Launch a new cycle on schedule even while the previous one is still
    /// running. Off by default to avoid duplicate notifications.
    pub allow_overlapping_cycles: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_url: None,
            webhook_url: None,
            channel: None,
            username: None,
            icon_emoji: None,
            interval_seconds: DEFAULT_INTERVAL_SECS,
            allow_overlapping_cycles: false,
        }
    }
}

/// Mask webhook_url in Debug output to prevent credential leakage.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("feed_url", &self.feed_url)
            .field(
                "webhook_url",
                &self.webhook_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("channel", &self.channel)
            .field("username", &self.username)
            .field("icon_emoji", &self.icon_emoji)
            .field("interval_seconds", &self.interval_seconds)
            .field(
                "allow_overlapping_cycles",
                &self.allow_overlapping_cycles,
            )
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

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
                // Race: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse as a raw table first to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "feed_url",
                "webhook_url",
                "channel",
                "username",
                "icon_emoji",
                "interval_seconds",
                "allow_overlapping_cycles",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            interval_seconds = config.interval_seconds,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Resolve the webhook URL, preferring the RELWATCH_WEBHOOK_URL env var
    /// over the config file.
    pub fn webhook_url(&self) -> Option<SecretString> {
        std::env::var("RELWATCH_WEBHOOK_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .map(SecretString::from)
            .or_else(|| self.webhook_url.clone().map(SecretString::from))
    }
}

// ============================================================================
// Tests
// ============================================================================
