//! Error types for the core module.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while loading configuration or declaring resources.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{0} config is required")]
    MissingConfig(String),

    #[error("Invalid value for config {key}: {message}")]
    InvalidConfig { key: String, message: String },

    #[error("Stack config not found at path: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Resource {0} is already declared")]
    DuplicateResource(String),

    #[error("Resource {resource} references undeclared resource {target}")]
    UnknownReference { resource: String, target: String },

    #[error("Declaration of {resource} failed: {message}")]
    DeclarationFailed { resource: String, message: String },

    #[error("Lookup {name} ({function}) failed: {message}")]
    InvokeFailed {
        name: String,
        function: String,
        message: String,
    },

    #[error("Lookup {name} has no property {property}")]
    MissingProperty { name: String, property: String },

    #[error("Output {0} is already exported")]
    DuplicateOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
