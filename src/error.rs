use std::path::PathBuf;
use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::retrieval::SearchError;
use crate::store::StoreError;

/// Main error type for talent-match
#[derive(Error, Debug)]
pub enum MatchError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// Record source file not found
    #[error("Data file not found: {path}")]
    DataNotFound { path: PathBuf },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Index store errors
    #[error("Index store error: {0}")]
    Store(#[from] StoreError),

    /// Embedding model errors
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Query-time retrieval errors
    #[error("Search error: {0}")]
    Search(#[from] SearchError),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for talent-match operations
pub type Result<T> = std::result::Result<T, MatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn open_missing() -> Result<()> {
        Err(StoreError::CollectionNotFound("talent_index".to_string()))?;
        Ok(())
    }

    #[test]
    fn test_component_errors_convert_to_typed_variants() {
        let err = open_missing().unwrap_err();
        assert!(matches!(
            err,
            MatchError::Store(StoreError::CollectionNotFound(_))
        ));
        assert_eq!(
            err.to_string(),
            "Index store error: Collection not found: talent_index"
        );
    }
}
