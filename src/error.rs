//! Error types and handling for shmclock

/// Result type alias for shmclock operations
pub type Result<T> = std::result::Result<T, ShmClockError>;

/// Error types for segment attachment, configuration and driver setup
///
/// Per-tick protocol outcomes (not ready, clash, stale, ...) are not errors;
/// see [`crate::protocol::ReadOutcome`] and [`crate::validate::Rejection`].
#[derive(Debug, thiserror::Error)]
pub enum ShmClockError {
    /// I/O related errors (file operations, mmap, etc.)
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Platform-specific errors (SysV IPC calls)
    #[error("Platform error: {message}")]
    Platform { message: String },

    /// Invalid parameters or configuration
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Segment could not be created or attached for a unit
    #[error("Segment unavailable for unit {unit}: {message}")]
    SegmentUnavailable { unit: u32, message: String },

    /// Existing backing store is smaller than the segment layout
    #[error("Layout mismatch: expected at least {expected} bytes, found {actual}")]
    LayoutMismatch { expected: usize, actual: usize },

    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl ShmClockError {
    /// Create an I/O error from a standard I/O error
    pub fn from_io(source: std::io::Error, context: &str) -> Self {
        Self::Io {
            message: format!("{}: {}", context, source),
            source: Some(source),
        }
    }

    /// Create a platform error
    pub fn platform(message: impl Into<String>) -> Self {
        Self::Platform {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a segment unavailable error
    pub fn segment_unavailable(unit: u32, message: impl Into<String>) -> Self {
        Self::SegmentUnavailable {
            unit,
            message: message.into(),
        }
    }

    /// Create a layout mismatch error
    pub fn layout_mismatch(expected: usize, actual: usize) -> Self {
        Self::LayoutMismatch { expected, actual }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ShmClockError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io(err, "I/O operation failed")
    }
}

impl From<toml::de::Error> for ShmClockError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(format!("TOML parse error: {}", err))
    }
}
