//! Error types for the retrieval engine.

use thiserror::Error;

/// Result type alias using CorpusError.
pub type Result<T> = std::result::Result<T, CorpusError>;

/// Errors that can occur in the retrieval engine.
///
/// Search never surfaces these to its caller; they are returned from index
/// building, persistence and configuration loading.
#[derive(Error, Debug)]
pub enum CorpusError {
    /// Invalid argument provided.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Embedding backend error (unavailable, crashed, or malformed output).
    #[error("Embedding error: {message}")]
    Embedding { message: String },

    /// Persistence error.
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// The index violates one of its structural invariants.
    #[error("Invalid index: {message}")]
    InvalidIndex { message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CorpusError {
    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an embedding error.
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create an invalid index error.
    pub fn invalid_index(message: impl Into<String>) -> Self {
        Self::InvalidIndex {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get a stable machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::Embedding { .. } => "EMBEDDING_ERROR",
            Self::Storage { .. } => "STORAGE_ERROR",
            Self::InvalidIndex { .. } => "INVALID_INDEX",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CorpusError::embedding("backend unavailable");
        assert!(err.to_string().contains("backend unavailable"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            CorpusError::invalid_argument("x").error_code(),
            "INVALID_ARGUMENT"
        );
        assert_eq!(CorpusError::storage("test").error_code(), "STORAGE_ERROR");
        assert_eq!(
            CorpusError::invalid_index("dangling chunk").error_code(),
            "INVALID_INDEX"
        );
        assert_eq!(CorpusError::embedding("x").error_code(), "EMBEDDING_ERROR");
        assert_eq!(CorpusError::config("x").error_code(), "CONFIG_ERROR");
        assert_eq!(CorpusError::internal("x").error_code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_bad_chunk_window_is_invalid_argument() {
        let err = crate::ChunkConfig::new(0, 0).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: CorpusError = io.into();
        assert_eq!(err.error_code(), "IO_ERROR");
    }
}
