//! Mock container runner for testing.
//!
//! Returns queued responses in order and captures every container launch so
//! tests can assert on the engine commands that would have run.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::config::{ContainerConfig, RunConfig};
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{ContainerRunner, ExecutionResult};

/// Canned response for one container run.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
}

impl MockResponse {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: i64, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Container launch captured by the mock.
#[derive(Debug, Clone)]
pub struct CapturedRun {
    pub image: String,
    pub command: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub workdir: Option<String>,
    pub mounts: Vec<String>,
}

#[derive(Clone)]
pub struct MockRunner {
    available: bool,
    responses: Arc<RwLock<VecDeque<MockResponse>>>,
    runs: Arc<RwLock<Vec<CapturedRun>>>,
    pulled: Arc<RwLock<Vec<String>>>,
    failure: Option<String>,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRunner {
    pub fn new() -> Self {
        Self {
            available: true,
            responses: Arc::new(RwLock::new(VecDeque::new())),
            runs: Arc::new(RwLock::new(Vec::new())),
            pulled: Arc::new(RwLock::new(Vec::new())),
            failure: None,
        }
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Queue a response; runs beyond the queue succeed with empty output.
    pub fn add_response(self, response: MockResponse) -> Self {
        self.responses.write().push_back(response);
        self
    }

    /// Make every run fail before a container starts.
    pub fn simulate_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn runs(&self) -> Vec<CapturedRun> {
        self.runs.read().clone()
    }

    /// Commands of every run, joined with spaces.
    pub fn commands(&self) -> Vec<String> {
        self.runs.read().iter().map(|r| r.command.join(" ")).collect()
    }

    pub fn pulled_images(&self) -> Vec<String> {
        self.pulled.read().clone()
    }
}

#[async_trait]
impl ContainerRunner for MockRunner {
    async fn is_available(&self) -> RunnerResult<bool> {
        Ok(self.available)
    }

    async fn version(&self) -> RunnerResult<String> {
        Ok("mock-runner".to_string())
    }

    async fn image_exists(&self, image: &str, tag: &str) -> RunnerResult<bool> {
        Ok(self.pulled.read().contains(&format!("{}:{}", image, tag)))
    }

    async fn pull_image(&self, image: &str, tag: &str) -> RunnerResult<()> {
        self.pulled.write().push(format!("{}:{}", image, tag));
        Ok(())
    }

    async fn run_container(
        &self,
        config: &ContainerConfig,
        _run_config: &RunConfig,
    ) -> RunnerResult<ExecutionResult> {
        if let Some(message) = &self.failure {
            return Err(RunnerError::ExecutionFailed(message.clone()));
        }

        self.runs.write().push(CapturedRun {
            image: config.full_image(),
            command: config.command.clone(),
            env: config.env.clone(),
            workdir: config.workdir.clone(),
            mounts: config.mounts.iter().map(|m| m.target.clone()).collect(),
        });

        let response = self
            .responses
            .write()
            .pop_front()
            .unwrap_or_else(|| MockResponse::success(""));
        let now = Utc::now();

        Ok(ExecutionResult {
            container_id: format!("mock-{}", self.runs.read().len()),
            exit_code: response.exit_code,
            stdout: response.stdout,
            stderr: response.stderr,
            started_at: now,
            finished_at: now,
            duration_ms: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_responses_in_order() {
        let runner = MockRunner::new()
            .add_response(MockResponse::success("first"))
            .add_response(MockResponse::failure(255, "second failed"));
        let config = ContainerConfig::new("pulumi/pulumi").command(vec!["pulumi".into(), "up".into()]);

        let first = runner.run_container(&config, &RunConfig::default()).await.unwrap();
        let second = runner.run_container(&config, &RunConfig::default()).await.unwrap();
        let third = runner.run_container(&config, &RunConfig::default()).await.unwrap();

        assert_eq!(first.stdout, "first");
        assert_eq!(second.exit_code, 255);
        assert!(third.success());
        assert_eq!(runner.commands(), vec!["pulumi up"; 3]);
    }

    #[tokio::test]
    async fn test_simulated_failure_captures_nothing() {
        let runner = MockRunner::new().simulate_failure("daemon gone");
        let config = ContainerConfig::new("img");

        assert!(runner.run_container(&config, &RunConfig::default()).await.is_err());
        assert!(runner.runs().is_empty());
    }

    #[tokio::test]
    async fn test_pull_tracking() {
        let runner = MockRunner::new();
        assert!(!runner.image_exists("pulumi/pulumi", "3").await.unwrap());
        runner.pull_image("pulumi/pulumi", "3").await.unwrap();
        assert!(runner.image_exists("pulumi/pulumi", "3").await.unwrap());
    }
}
