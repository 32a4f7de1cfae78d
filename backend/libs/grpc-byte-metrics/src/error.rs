//! Error types for byte metrics setup and export
//!
//! Nothing on the per-call path returns these. They only surface while
//! loading configuration, registering the metric set, or rendering a scrape.

use thiserror::Error;

/// Result type for byte metrics operations
pub type Result<T> = std::result::Result<T, ByteMetricsError>;

/// Errors that can occur while wiring byte metrics into a server
#[derive(Debug, Error)]
pub enum ByteMetricsError {
    /// Environment configuration could not be parsed
    #[error("Byte metrics configuration invalid: {0}")]
    Config(#[from] envy::Error),

    /// The registry rejected the metric set (e.g. registered twice)
    #[error("Byte metrics registration failed: {0}")]
    Registration(#[from] prometheus::Error),

    /// Gathered metrics could not be rendered
    #[error("Byte metrics encoding failed: {0}")]
    Encoding(String),
}

impl ByteMetricsError {
    /// Create an encoding error
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    /// True when the registry reported the metric set as already registered
    pub fn is_already_registered(&self) -> bool {
        matches!(self, Self::Registration(prometheus::Error::AlreadyReg))
    }
}
