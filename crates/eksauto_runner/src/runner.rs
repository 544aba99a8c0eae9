//! Container runner trait and types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{ContainerConfig, RunConfig};
use crate::error::RunnerResult;

/// Result of one container execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub container_id: String,
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout followed by stderr.
    pub fn combined_output(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (true, _) => self.stderr.clone(),
            (_, true) => self.stdout.clone(),
            _ => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

/// Executes containers.
#[async_trait]
pub trait ContainerRunner: Send + Sync {
    async fn is_available(&self) -> RunnerResult<bool>;

    async fn version(&self) -> RunnerResult<String>;

    async fn image_exists(&self, image: &str, tag: &str) -> RunnerResult<bool>;

    async fn pull_image(&self, image: &str, tag: &str) -> RunnerResult<()>;

    /// Run a container to completion and capture its output.
    async fn run_container(
        &self,
        config: &ContainerConfig,
        run_config: &RunConfig,
    ) -> RunnerResult<ExecutionResult>;
}
