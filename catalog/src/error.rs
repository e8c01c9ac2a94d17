//! Error types for catalog operations.
//!
//! Covers I/O, serialization, compression, and the validation failures that
//! make a resource or configuration file unusable.

use store_ladder_core::ValidationError;
use thiserror::Error;

/// Errors that can occur while reading or writing catalog resources.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Gzip compression or decompression failure.
    #[error("compression error: {0}")]
    CompressionError(String),

    /// A model failed validation.
    #[error("invalid model {name}: {}", join_errors(.errors))]
    InvalidModel {
        /// Model name or file.
        name: String,
        /// Validation problems found.
        errors: Vec<ValidationError>,
    },

    /// Configuration validation failure.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convenience alias for results with [`CatalogError`].
pub type Result<T> = std::result::Result<T, CatalogError>;
