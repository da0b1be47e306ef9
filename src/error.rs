use std::path::PathBuf;
use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::ingest::IngestError;

/// Main error type for kindex
#[derive(Error, Debug)]
pub enum KindexError {
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

    /// The embedding service failed; nothing was mutated
    #[error("Embedding service error: {0}")]
    EmbeddingService(#[from] EmbeddingError),

    /// The snapshot could not be reconstructed
    #[error("Snapshot at {path} is corrupt: {reason}")]
    SnapshotCorrupt { path: PathBuf, reason: String },

    /// A vector does not match the dimension fixed by the store
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A vector contains NaN or infinite components
    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    /// Caller supplied an argument outside the accepted range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Tabular or transcript ingestion errors
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

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

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
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

/// Result type for kindex operations
pub type Result<T> = std::result::Result<T, KindexError>;
