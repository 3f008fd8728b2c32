//! Error types for the Auto Advisor MCP Server
//!
//! This module defines the error hierarchy for all operations in the server.

use thiserror::Error;

/// Main error type for the Auto Advisor MCP Server
#[derive(Error, Debug)]
pub enum AdvisorError {
    /// Source table does not carry the expected columns
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Tool argument errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Price model errors
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// MCP protocol errors
    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),

    /// Any other handler-level fault
    #[error("Internal error: {message}")]
    Internal { message: String },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV parsing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Source table schema errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Missing columns in dataset: {}", columns.join(", "))]
    MissingColumns { columns: Vec<String> },
}

/// Tool argument errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid arguments: {message}")]
    InvalidArguments { message: String },
}

/// Price model errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Cannot fit with zero samples")]
    EmptyTrainingSet,

    #[error("Number of samples ({samples}) must match target length ({targets})")]
    SampleMismatch { samples: usize, targets: usize },

    #[error("Expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Regression failed: {0}")]
    Fit(#[from] aprender::error::AprenderError),

    #[error("Feature {feature} received a value of the wrong kind")]
    FeatureKindMismatch { feature: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Data file not found: {path}")]
    DataFileNotFound { path: String },
}

/// MCP protocol errors
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },
}

/// Result type alias for Auto Advisor operations
pub type Result<T> = std::result::Result<T, AdvisorError>;
