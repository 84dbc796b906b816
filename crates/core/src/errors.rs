//! Error types

use thiserror::Error;

/// Core error types
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Errors carried on a price feed's error stream
///
/// Upstream feeds report `Upstream` or `Closed`; these stay inside the
/// source worker that observed them. `NoValidData` is the aggregate-level
/// failure emitted once by an aggregator before it closes its streams.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("Upstream feed error: {0}")]
    Upstream(String),

    #[error("Feed closed")]
    Closed,

    #[error("no valid data")]
    NoValidData,
}

impl FeedError {
    pub fn upstream(message: impl Into<String>) -> Self {
        FeedError::Upstream(message.into())
    }
}

/// Result type alias
pub type CoreResult<T> = Result<T, CoreError>;
pub type FeedResult<T> = Result<T, FeedError>;
