/// Error types for the feed watchdog
pub mod error;

/// Record and datapoint model for the remote log store
pub mod record;

/// Configuration management
pub mod config;

/// Log store client
pub mod store;

/// Notification sink
pub mod notify;

/// Edge-triggered alert state machine
pub mod alerts;

/// Garbage collection of future-dated records
pub mod gc;

/// One evaluation cycle over store, alerts and notifications
pub mod monitor;

/// Fixed-interval poll scheduler
pub mod scheduler;

// Re-export commonly used types
pub use error::{ConfigError, NotifyError, SchedulerError, StoreError};
