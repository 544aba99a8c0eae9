//! Error types for IaC module.

use thiserror::Error;

/// Result type alias for IaC operations.
pub type IacResult<T> = Result<T, IacError>;

/// Errors that can occur while declaring, rendering or deploying the stack.
#[derive(Error, Debug)]
pub enum IacError {
    #[error(transparent)]
    Core(#[from] eksauto_core::CoreError),

    #[error("Trust policy for role {role} could not be serialized: {source}")]
    PolicySerialization {
        role: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Project rendering failed: {0}")]
    RenderFailed(String),

    #[error("Program validation failed: {0}")]
    ValidationFailed(String),

    #[error("pulumi {command} failed (exit {exit_code}): {output}")]
    EngineFailed {
        command: String,
        exit_code: i64,
        output: String,
    },

    #[error("Runner error: {0}")]
    Runner(#[from] eksauto_runner::RunnerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
