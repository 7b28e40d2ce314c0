//! Error taxonomy for the conversion pipeline.
//!
//! Every failure a conversion can hit funnels into [`Error`]. Each variant maps
//! to a stable [`ErrorKind`] that the transport layer turns into a status code
//! via [`Error::http_status`]; the core never builds responses itself.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unified error type covering all failure modes of a conversion.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The source file's extension is not a recognized image or audio type.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The requested target is not valid for the detected media kind.
    #[error("Invalid target format: {0}")]
    InvalidTargetFormat(String),

    /// The input bytes could not be parsed as the declared kind.
    #[error("Decode error: {0}")]
    Decode(String),

    /// An effect parameter was missing a sane value.
    #[error("Effect parameter error: {0}")]
    EffectParameter(String),

    /// The encoder rejected otherwise valid decoded data.
    #[error("Encode error: {0}")]
    Encode(String),

    /// A required external tool is missing or could not be started.
    #[error("Backend unavailable [{tool}]: {message}")]
    BackendUnavailable {
        /// Name of the tool (e.g. "ffmpeg").
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Scratch-file allocation or write failed.
    #[error("Storage error: {message}")]
    Storage {
        /// What the pipeline was trying to do.
        message: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Stable, serializable classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedFormat,
    InvalidTargetFormat,
    DecodeError,
    EffectParameterError,
    EncodeError,
    BackendUnavailable,
    StorageError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UnsupportedFormat => "unsupported_format",
            Self::InvalidTargetFormat => "invalid_target_format",
            Self::DecodeError => "decode_error",
            Self::EffectParameterError => "effect_parameter_error",
            Self::EncodeError => "encode_error",
            Self::BackendUnavailable => "backend_unavailable",
            Self::StorageError => "storage_error",
        };
        f.write_str(s)
    }
}

impl Error {
    /// The taxonomy entry for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Error::InvalidTargetFormat(_) => ErrorKind::InvalidTargetFormat,
            Error::Decode(_) => ErrorKind::DecodeError,
            Error::EffectParameter(_) => ErrorKind::EffectParameterError,
            Error::Encode(_) => ErrorKind::EncodeError,
            Error::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            Error::Storage { .. } => ErrorKind::StorageError,
        }
    }

    /// Map this error to an appropriate HTTP status code.
    ///
    /// Anything caused by the caller's input is a 400; failures of the
    /// machine doing the work are 5xx.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::UnsupportedFormat(_) => 400,
            Error::InvalidTargetFormat(_) => 400,
            Error::Decode(_) => 400,
            Error::EffectParameter(_) => 400,
            Error::Encode(_) => 500,
            Error::BackendUnavailable { .. } => 503,
            Error::Storage { .. } => 500,
        }
    }

    /// Whether the caller (rather than the host) is at fault.
    pub fn is_client_error(&self) -> bool {
        self.http_status() < 500
    }

    /// Convenience constructor for [`Error::BackendUnavailable`].
    pub fn backend(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::BackendUnavailable {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Storage`].
    pub fn storage(message: impl Into<String>, source: std::io::Error) -> Self {
        Error::Storage {
            message: message.into(),
            source,
        }
    }

    /// Structured payload for callers that report errors as data.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// Serializable error value: a kind plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
