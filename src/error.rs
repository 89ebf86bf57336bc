//! Error types for ldsvoice.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpeechError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    // Entity source errors
    #[error("Entity file not found: {path}")]
    EntityNotFound { path: String },

    #[error("Failed to parse entity {path}: {message}")]
    EntityParse { path: String, message: String },

    #[error("Invalid entity pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    // Output sink errors
    #[error("Output sink '{sink}' unavailable: {reason}")]
    SinkUnavailable { sink: String, reason: String },

    #[error("Output sink '{sink}' failed: {message}")]
    SinkFailed { sink: String, message: String },

    #[error("Cloud synthesis request failed: {message}")]
    CloudRequest { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl SpeechError {
    /// Shorthand for a render failure in the named sink.
    pub fn sink_failed(sink: &str, message: impl Into<String>) -> Self {
        SpeechError::SinkFailed {
            sink: sink.to_string(),
            message: message.into(),
        }
    }

    /// Returns true if this error means a requested file does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            SpeechError::EntityNotFound { .. } | SpeechError::ConfigFileNotFound { .. } => true,
            SpeechError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, SpeechError>;
