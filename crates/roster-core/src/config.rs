//! Configuration management for Roster.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main application configuration.
///
/// This is loaded from `~/.config/roster/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Pacing, backoff and pagination settings
    pub crawl: CrawlConfig,
    /// Outbound HTTP client settings
    pub http: HttpConfig,
    /// Source definition settings
    pub sources: SourcesConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `ROSTER_BASE_DELAY_MS`: Override the baseline inter-request delay
    /// - `ROSTER_MAX_RETRIES`: Override the retry threshold
    /// - `ROSTER_REQUEST_TIMEOUT_SECS`: Override the per-fetch timeout
    /// - `ROSTER_DEFINITIONS_DIR`: Override the source definitions directory
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("ROSTER_BASE_DELAY_MS") {
            if let Ok(ms) = val.parse() {
                self.crawl.base_delay_ms = ms;
                tracing::debug!("Override crawl.base_delay_ms from env: {}", ms);
            }
        }

        if let Ok(val) = std::env::var("ROSTER_MAX_RETRIES") {
            if let Ok(retries) = val.parse() {
                self.crawl.max_retries = retries;
                tracing::debug!("Override crawl.max_retries from env: {}", retries);
            }
        }

        if let Ok(val) = std::env::var("ROSTER_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.crawl.request_timeout_secs = secs;
                tracing::debug!("Override crawl.request_timeout_secs from env: {}", secs);
            }
        }

        if let Ok(val) = std::env::var("ROSTER_DEFINITIONS_DIR") {
            tracing::debug!("Override sources.definitions_dir from env: {}", val);
            self.sources.definitions_dir = Some(PathBuf::from(val));
        }
    }

    /// Check that values are usable by the crawler.
    pub fn validate(&self) -> ConfigResult<()> {
        self.crawl.validate()?;
        if self.http.user_agents.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "http.user_agents".to_string(),
                reason: "identity pool needs at least one user agent".to_string(),
            });
        }
        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/roster/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("org", "roster", "roster").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// Pacing, backoff and pagination settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Baseline delay between requests to one source, in milliseconds
    pub base_delay_ms: u64,
    /// Ceiling for the backoff delay, in milliseconds
    pub max_delay_ms: u64,
    /// Upper bound of the random jitter added to each wait, in milliseconds
    pub jitter_ms: u64,
    /// Consecutive failures tolerated before a partition is abandoned
    pub max_retries: u32,
    /// How long the circuit stays open after the retry threshold is exceeded
    pub circuit_cooldown_secs: u64,
    /// Consecutive empty pages tolerated after the first page
    pub max_consecutive_empty: u32,
    /// Wall-clock bound on a single fetch
    pub request_timeout_secs: u64,
}

impl CrawlConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.base_delay_ms > self.max_delay_ms {
            return Err(ConfigError::InvalidValue {
                field: "crawl.base_delay_ms".to_string(),
                reason: format!(
                    "baseline {}ms exceeds ceiling {}ms",
                    self.base_delay_ms, self.max_delay_ms
                ),
            });
        }
        if self.max_consecutive_empty == 0 {
            return Err(ConfigError::InvalidValue {
                field: "crawl.max_consecutive_empty".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !(1..=120).contains(&self.request_timeout_secs) {
            return Err(ConfigError::InvalidValue {
                field: "crawl.request_timeout_secs".to_string(),
                reason: format!("must be 1-120, got {}", self.request_timeout_secs),
            });
        }
        Ok(())
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1500,
            max_delay_ms: 60_000,
            jitter_ms: 250,
            max_retries: 3,
            circuit_cooldown_secs: 120,
            max_consecutive_empty: 2,
            request_timeout_secs: 20,
        }
    }
}

/// Outbound HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// User agents the identity pool rotates through
    pub user_agents: Vec<String>,
    /// `Accept-Language` values the identity pool rotates through
    pub accept_languages: Vec<String>,
    /// Whether redirects are followed
    pub follow_redirects: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15".to_string(),
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0".to_string(),
            ],
            accept_languages: vec![
                "en-US,en;q=0.9".to_string(),
                "en-US,en;q=0.8".to_string(),
                "en-GB,en;q=0.9,en-US;q=0.8".to_string(),
            ],
            follow_redirects: true,
        }
    }
}

/// Source definition settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Directory holding TOML source definitions; `None` means the
    /// `source-definitions/` directory at the workspace root
    pub definitions_dir: Option<PathBuf>,
}
