//! Error types for narkeep
//!
//! All modules use `NarkeepResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for narkeep operations
pub type NarkeepResult<T> = Result<T, NarkeepError>;

/// All errors that can occur in narkeep
#[derive(Error, Debug)]
pub enum NarkeepError {
    // Store errors
    #[error("Not a NAR store directory: {0}")]
    StoreDirInvalid(PathBuf),

    #[error("Not a valid store path hash: {0}")]
    InvalidStoreHash(String),

    #[error("No narinfo for {hash} in store")]
    NarInfoNotFound { hash: String },

    #[error("Unsupported compression type: {0}")]
    UnsupportedCompression(String),

    // Remote cache errors
    #[error("Request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    // Build source errors
    #[error("Querying build source for {path} failed: {reason}")]
    SourceQuery { path: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NarkeepError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether this error means "the record simply is not there"
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NarInfoNotFound { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::StoreDirInvalid(_) => {
                Some("Pass the path of a binary cache directory (the one holding .narinfo files)")
            }
            Self::InvalidStoreHash(_) => {
                Some("Store path hashes are 32 characters from 0123456789abcdfghijklmnpqrsvwxyz")
            }
            Self::UnsupportedCompression(_) => Some("Supported compression types: xz, zstd, none"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = NarkeepError::UnsupportedCompression("br".to_string());
        assert!(err.to_string().contains("Unsupported compression"));
        assert!(err.to_string().contains("br"));
    }

    #[test]
    fn error_hint() {
        let err = NarkeepError::UnsupportedCompression("br".to_string());
        assert_eq!(err.hint(), Some("Supported compression types: xz, zstd, none"));
        assert!(NarkeepError::Network {
            url: "http://x".to_string(),
            reason: "timeout".to_string(),
        }
        .hint()
        .is_none());
    }

    #[test]
    fn error_not_found() {
        assert!(NarkeepError::NarInfoNotFound {
            hash: "x".to_string()
        }
        .is_not_found());
        assert!(!NarkeepError::StoreDirInvalid(PathBuf::from("/x")).is_not_found());
    }
}
