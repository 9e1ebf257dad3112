//! Configuration loading and validation
//!
//! All knobs are supplied once at process start from a TOML file; there is no
//! runtime reconfiguration. Credentials for the store and the notification
//! channel live here too, so a config that fails validation is fatal during
//! bootstrap rather than degrading into a half-running daemon.

use crate::error::ConfigError;
use chrono::FixedOffset;
use serde::Deserialize;
use std::path::Path;

/// Default request timeout applied to both HTTP clients
fn default_request_timeout() -> u64 {
    10
}

/// Default collection path within the store
fn default_store_path() -> String {
    "/log".to_string()
}

/// Default source offset: producer clock assumed to be UTC
fn default_source_offset() -> String {
    "+00:00".to_string()
}

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Config {
    pub store: StoreConfig,
    pub telegram: TelegramConfig,
    pub monitor: MonitorConfig,
}

/// Connection settings for the remote log store
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StoreConfig {
    /// Base URL of the store, e.g. `https://example.firebaseio.com`
    pub base_url: String,
    /// Collection path holding the records
    #[serde(default = "default_store_path")]
    pub path: String,
    /// Optional database auth token appended to every request
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

/// Credentials and destination for the Telegram notification channel
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Destination chat: numeric id or `@channel` handle
    pub chat_id: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

/// Detection thresholds and polling cadence
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MonitorConfig {
    /// Minutes of silence after which the feed counts as stale
    pub staleness_threshold_minutes: i64,
    /// Seconds between evaluation cycles
    pub poll_interval_seconds: u64,
    /// UTC offset the producer bakes into its timestamps, e.g. `"+03:00"`
    #[serde(default = "default_source_offset")]
    pub source_utc_offset: String,
}

impl Config {
    /// Load and validate configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read,
    /// `ConfigError::TomlError` if it is not valid TOML, and
    /// `ConfigError::ValidationError` if any value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.store.base_url.starts_with("http://") && !self.store.base_url.starts_with("https://")
        {
            return Err(ConfigError::ValidationError(format!(
                "store.base_url must be an http(s) URL, got '{}'",
                self.store.base_url
            )));
        }
        if !self.store.path.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "store.path must start with '/', got '{}'",
                self.store.path
            )));
        }
        if self.store.request_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "store.request_timeout_seconds must be positive".to_string(),
            ));
        }
        if self.telegram.bot_token.is_empty() {
            return Err(ConfigError::ValidationError(
                "telegram.bot_token must not be empty".to_string(),
            ));
        }
        if self.telegram.chat_id.is_empty() {
            return Err(ConfigError::ValidationError(
                "telegram.chat_id must not be empty".to_string(),
            ));
        }
        if self.telegram.request_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "telegram.request_timeout_seconds must be positive".to_string(),
            ));
        }
        if self.monitor.staleness_threshold_minutes <= 0 {
            return Err(ConfigError::ValidationError(
                "monitor.staleness_threshold_minutes must be positive".to_string(),
            ));
        }
        if self.monitor.poll_interval_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "monitor.poll_interval_seconds must be positive".to_string(),
            ));
        }
        self.source_offset()?;
        Ok(())
    }

    /// Parse the configured producer UTC offset
    pub fn source_offset(&self) -> Result<FixedOffset, ConfigError> {
        self.monitor
            .source_utc_offset
            .parse::<FixedOffset>()
            .map_err(|e| {
                ConfigError::ValidationError(format!(
                    "monitor.source_utc_offset '{}' is not a valid offset: {}",
                    self.monitor.source_utc_offset, e
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn valid_toml() -> &'static str {
        r#"
            [store]
            base_url = "https://example.firebaseio.com"
            path = "/log"
            auth_token = "secret"

            [telegram]
            bot_token = "123:abc"
            chat_id = "@alerts"

            [monitor]
            staleness_threshold_minutes = 40
            poll_interval_seconds = 300
            source_utc_offset = "+03:00"
        "#
    }

    #[test]
    fn test_load_full_config() {
        let file = write_config(valid_toml());
        let config = Config::from_file(file.path()).unwrap();

        assert_eq!(config.store.base_url, "https://example.firebaseio.com");
        assert_eq!(config.store.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.telegram.chat_id, "@alerts");
        assert_eq!(config.monitor.staleness_threshold_minutes, 40);
        assert_eq!(config.monitor.poll_interval_seconds, 300);
        assert_eq!(config.source_offset().unwrap().local_minus_utc(), 10800);
    }

    #[test]
    fn test_defaults_applied_when_omitted() {
        let file = write_config(
            r#"
            [store]
            base_url = "https://example.firebaseio.com"

            [telegram]
            bot_token = "123:abc"
            chat_id = "@alerts"

            [monitor]
            staleness_threshold_minutes = 40
            poll_interval_seconds = 300
        "#,
        );
        let config = Config::from_file(file.path()).unwrap();

        assert_eq!(config.store.path, "/log");
        assert_eq!(config.store.auth_token, None);
        assert_eq!(config.store.request_timeout_seconds, 10);
        assert_eq!(config.telegram.request_timeout_seconds, 10);
        assert_eq!(config.monitor.source_utc_offset, "+00:00");
        assert_eq!(config.source_offset().unwrap().local_minus_utc(), 0);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let result = Config::from_file(Path::new("/nonexistent/vigil.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError(_))));
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let file = write_config("not valid toml [");
        let result = Config::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::TomlError(_))));
    }

    #[test]
    fn test_rejects_non_positive_threshold() {
        let toml = valid_toml().replace(
            "staleness_threshold_minutes = 40",
            "staleness_threshold_minutes = 0",
        );
        let file = write_config(&toml);
        let result = Config::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_rejects_zero_poll_interval() {
        let toml = valid_toml().replace("poll_interval_seconds = 300", "poll_interval_seconds = 0");
        let file = write_config(&toml);
        let result = Config::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_rejects_malformed_offset() {
        let toml = valid_toml().replace("\"+03:00\"", "\"Europe/Moscow\"");
        let file = write_config(&toml);
        let result = Config::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let toml = valid_toml().replace("https://example.firebaseio.com", "example.firebaseio.com");
        let file = write_config(&toml);
        let result = Config::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_rejects_empty_bot_token() {
        let toml = valid_toml().replace("bot_token = \"123:abc\"", "bot_token = \"\"");
        let file = write_config(&toml);
        let result = Config::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
