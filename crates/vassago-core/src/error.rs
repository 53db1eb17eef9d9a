//! Error types for the Vassago service.

use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the Vassago service.
///
/// Variants are split into client faults (the caller can fix the request) and
/// server faults (something on our side failed). See [`Error::is_client_error`].
#[derive(Error, Debug)]
pub enum Error {
    /// No language model is loaded.
    #[error("Model not loaded. Please load a model first")]
    NotLoaded,

    /// A model could not be loaded.
    #[error("Failed to load model {model_id}: {message}")]
    ModelLoad {
        /// The requested model identifier.
        model_id: String,
        /// Error message.
        message: String,
    },

    /// The request named a model other than the one that is loaded.
    #[error("Model {requested} is not loaded (current model: {current})")]
    ModelMismatch {
        /// The model named in the request.
        requested: String,
        /// The model that is actually loaded.
        current: String,
    },

    /// Uploaded file has an extension we cannot parse.
    #[error("Unsupported file type: {extension}")]
    UnsupportedFormat {
        /// The offending extension (may be empty).
        extension: String,
    },

    /// A document could not be parsed.
    #[error("Failed to parse {source_name}: {message}")]
    Parse {
        /// File the error came from.
        source_name: String,
        /// Error message.
        message: String,
    },

    /// An image payload could not be decoded.
    #[error("Failed to decode image: {message}")]
    Decode {
        /// Error message.
        message: String,
    },

    /// The vision model failed.
    #[error("Vision error: {message}")]
    Vision {
        /// Error message.
        message: String,
    },

    /// Retrieval (embedding or vector search) failed.
    #[error("Retrieval error: {message}")]
    Retrieval {
        /// Error message.
        message: String,
    },

    /// Text generation failed.
    #[error("Generation error: {message}")]
    Generation {
        /// Error message.
        message: String,
    },

    /// The request itself is malformed.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Error message.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error (unexpected state).
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl Error {
    /// Returns `true` if the caller is at fault (maps to HTTP 400).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotLoaded
                | Self::ModelMismatch { .. }
                | Self::UnsupportedFormat { .. }
                | Self::Decode { .. }
                | Self::InvalidRequest { .. }
        )
    }

    /// Stable machine-readable name of the error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotLoaded => "model_not_loaded",
            Self::ModelLoad { .. } => "model_load_error",
            Self::ModelMismatch { .. } => "model_mismatch",
            Self::UnsupportedFormat { .. } => "unsupported_format",
            Self::Parse { .. } => "parse_error",
            Self::Decode { .. } => "decode_error",
            Self::Vision { .. } => "vision_error",
            Self::Retrieval { .. } => "retrieval_error",
            Self::Generation { .. } => "generation_error",
            Self::InvalidRequest { .. } => "invalid_request_error",
            Self::Io(_) => "io_error",
            Self::Serialization(_) => "serialization_error",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// Creates an internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a model load error.
    #[must_use]
    pub fn model_load(model_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModelLoad {
            model_id: model_id.into(),
            message: message.into(),
        }
    }

    /// Creates a parse error for the named source.
    #[must_use]
    pub fn parse(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Creates a decode error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates a vision error.
    #[must_use]
    pub fn vision(message: impl Into<String>) -> Self {
        Self::Vision {
            message: message.into(),
        }
    }

    /// Creates a retrieval error.
    #[must_use]
    pub fn retrieval(message: impl Into<String>) -> Self {
        Self::Retrieval {
            message: message.into(),
        }
    }

    /// Creates a generation error.
    #[must_use]
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    /// Creates an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        assert!(Error::NotLoaded.is_client_error());
        assert!(Error::UnsupportedFormat {
            extension: ".exe".into()
        }
        .is_client_error());
        assert!(Error::decode("bad base64").is_client_error());
        assert!(Error::invalid_request("empty query").is_client_error());
    }

    #[test]
    fn test_server_errors() {
        assert!(!Error::model_load("x", "no such model").is_client_error());
        assert!(!Error::parse("a.pdf", "truncated").is_client_error());
        assert!(!Error::generation("backend closed").is_client_error());
        assert!(!Error::internal("oops").is_client_error());
    }

    #[test]
    fn test_display() {
        let err = Error::model_load("unknown-model", "not served by backend");
        assert_eq!(
            err.to_string(),
            "Failed to load model unknown-model: not served by backend"
        );
        assert_eq!(err.kind(), "model_load_error");
    }
}
