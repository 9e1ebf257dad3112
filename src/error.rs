use thiserror::Error;

/// Errors that can occur when talking to the log store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store contains no records")]
    Empty,

    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store rejected request: {0}")]
    Backend(String),

    #[error("failed to parse store response: {0}")]
    Parse(String),
}

/// Errors that can occur when delivering a notification
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("notification rejected by channel: {0}")]
    Delivery(String),
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(String),

    #[error("invalid configuration value: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Errors that can occur when driving the poll scheduler
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("scheduler cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },

    #[error("failed to join scheduler thread")]
    JoinFailed,
}

impl StoreError {
    /// Whether a retry on the next poll cycle could plausibly succeed.
    ///
    /// `Empty` is a precondition violation rather than a transient fault, so
    /// it is not considered retryable.
    pub fn is_transient(&self) -> bool {
        !matches!(self, StoreError::Empty)
    }
}
