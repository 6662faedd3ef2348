//! Error types for encodec-relay.

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio normalization errors
    #[error("Audio decode failed: {message}")]
    Decode { message: String },

    #[error("Audio tool unavailable: {message}")]
    ToolUnavailable { message: String },

    // Tensor preparation errors
    #[error("Tensor shape error: {message}")]
    Shape { message: String },

    #[error("Model output missing: {message}")]
    MissingOutput { message: String },

    // Model errors
    #[error("Failed to load model from {path}: {message}")]
    ModelLoad { path: String, message: String },

    #[error("Inference failed: {message}")]
    Inference { message: String },

    // Serialization errors
    #[error("Value {value} at index {index} exceeds the safe integer range")]
    RangeOverflow { index: usize, value: String },

    // Remote service errors
    #[error("Remote service error: {detail}")]
    Remote { detail: String },

    // Orchestration errors
    #[error("A pipeline run is already in progress")]
    Busy,

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stable name of an error kind, suitable for display and matching by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Decode,
    ToolUnavailable,
    Shape,
    MissingOutput,
    ModelLoad,
    Inference,
    RangeOverflow,
    Remote,
    Busy,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Config => "ConfigError",
            ErrorKind::Decode => "DecodeError",
            ErrorKind::ToolUnavailable => "ToolUnavailableError",
            ErrorKind::Shape => "ShapeError",
            ErrorKind::MissingOutput => "MissingOutputError",
            ErrorKind::ModelLoad => "ModelLoadError",
            ErrorKind::Inference => "InferenceError",
            ErrorKind::RangeOverflow => "RangeOverflowError",
            ErrorKind::Remote => "RemoteError",
            ErrorKind::Busy => "BusyError",
            ErrorKind::Io => "IoError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a user should take away from a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// The input file could not be turned into audio.
    BadInput,
    /// The model file is missing, corrupt, or cannot run.
    ModelUnavailable,
    /// The decoding service rejected the payload or could not be reached.
    Service,
    /// An internal invariant was violated (e.g. a value outside the safe range).
    Invariant,
    /// Another run is still in progress.
    Busy,
    /// Local environment problem (config, filesystem, missing tools).
    Environment,
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureCategory::BadInput => "bad input file",
            FailureCategory::ModelUnavailable => "model unavailable",
            FailureCategory::Service => "network/service failure",
            FailureCategory::Invariant => "programming invariant violated",
            FailureCategory::Busy => "busy",
            FailureCategory::Environment => "environment",
        };
        f.write_str(label)
    }
}

impl RelayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::ConfigParse { .. }
            | RelayError::ConfigInvalidValue { .. }
            | RelayError::Config(_) => ErrorKind::Config,
            RelayError::Decode { .. } => ErrorKind::Decode,
            RelayError::ToolUnavailable { .. } => ErrorKind::ToolUnavailable,
            RelayError::Shape { .. } => ErrorKind::Shape,
            RelayError::MissingOutput { .. } => ErrorKind::MissingOutput,
            RelayError::ModelLoad { .. } => ErrorKind::ModelLoad,
            RelayError::Inference { .. } => ErrorKind::Inference,
            RelayError::RangeOverflow { .. } => ErrorKind::RangeOverflow,
            RelayError::Remote { .. } => ErrorKind::Remote,
            RelayError::Busy => ErrorKind::Busy,
            RelayError::Io(_) => ErrorKind::Io,
        }
    }

    pub fn category(&self) -> FailureCategory {
        match self.kind() {
            ErrorKind::Decode | ErrorKind::Shape => FailureCategory::BadInput,
            ErrorKind::ModelLoad | ErrorKind::Inference | ErrorKind::MissingOutput => {
                FailureCategory::ModelUnavailable
            }
            ErrorKind::Remote => FailureCategory::Service,
            ErrorKind::RangeOverflow => FailureCategory::Invariant,
            ErrorKind::Busy => FailureCategory::Busy,
            ErrorKind::Config | ErrorKind::ToolUnavailable | ErrorKind::Io => {
                FailureCategory::Environment
            }
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, RelayError>;
