//! Error Handling Module
//!
//! Defines custom error types for the energy grid library.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for energy grid operations
#[derive(Error, Debug)]
pub enum EnergyGridError {
    /// Error with dataset operations
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Error with model operations
    #[error("Model error: {0}")]
    Model(String),

    /// Error with training
    #[error("Training error: {0}")]
    Training(String),

    /// Error with inference
    #[error("Inference error: {0}")]
    Inference(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

impl From<serde_json::Error> for EnergyGridError {
    fn from(err: serde_json::Error) -> Self {
        EnergyGridError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for EnergyGridError {
    fn from(err: bincode::Error) -> Self {
        EnergyGridError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for EnergyGridError {
    fn from(err: csv::Error) -> Self {
        EnergyGridError::Dataset(err.to_string())
    }
}

/// Convenience Result type for energy grid operations
pub type Result<T> = std::result::Result<T, EnergyGridError>;
