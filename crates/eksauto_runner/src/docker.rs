//! Docker implementation of ContainerRunner.

use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::service::{HostConfig, Mount, MountTypeEnum};
use bollard::Docker;
use chrono::Utc;
use futures_util::StreamExt;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{ContainerConfig, RunConfig};
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{ContainerRunner, ExecutionResult};

/// Runner talking to the local Docker daemon.
pub struct DockerRunner {
    client: Docker,
}

impl DockerRunner {
    /// Connect with local defaults (socket or `DOCKER_HOST`).
    pub async fn new() -> RunnerResult<Self> {
        let client = Docker::connect_with_local_defaults()
            .map_err(|e| RunnerError::DockerNotAvailable(e.to_string()))?;
        client
            .ping()
            .await
            .map_err(|e| RunnerError::DockerNotAvailable(e.to_string()))?;
        Ok(Self { client })
    }

    fn container_name(prefix: Option<&str>) -> String {
        let id = Uuid::new_v4().simple().to_string();
        format!("{}-{}", prefix.unwrap_or("eksauto"), &id[..8])
    }

    async fn wait_for_exit(&self, container_id: &str) -> RunnerResult<i64> {
        let mut stream = self
            .client
            .wait_container(container_id, None::<WaitContainerOptions<String>>);

        match stream.next().await {
            Some(Ok(exit)) => Ok(exit.status_code),
            // non-zero exits surface as an error carrying the code
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(RunnerError::ExecutionFailed(e.to_string())),
            None => Err(RunnerError::ExecutionFailed("container wait returned nothing".into())),
        }
    }

    async fn collect_logs(&self, container_id: &str) -> (String, String) {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        };

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut stream = self.client.logs(container_id, Some(options));

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(LogOutput::StdOut { message }) => stdout.push_str(&String::from_utf8_lossy(&message)),
                Ok(LogOutput::StdErr { message }) => stderr.push_str(&String::from_utf8_lossy(&message)),
                Ok(_) => {}
                Err(e) => {
                    warn!("Log stream for {} ended early: {}", container_id, e);
                    break;
                }
            }
        }

        (stdout, stderr)
    }

    /// Start a created container, wait for it and read its logs.
    async fn execute(
        &self,
        container_id: &str,
        name: &str,
        run_config: &RunConfig,
    ) -> RunnerResult<(i64, String, String)> {
        self.client
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await?;

        let exit_code = if run_config.timeout_seconds > 0 {
            match timeout(
                Duration::from_secs(run_config.timeout_seconds),
                self.wait_for_exit(container_id),
            )
            .await
            {
                Ok(code) => code?,
                Err(_) => {
                    warn!("Container {} timed out, stopping", name);
                    if let Err(e) = self.client.stop_container(container_id, None).await {
                        warn!("Failed to stop container {}: {}", container_id, e);
                    }
                    return Err(RunnerError::Timeout(run_config.timeout_seconds));
                }
            }
        } else {
            self.wait_for_exit(container_id).await?
        };

        let (stdout, stderr) = self.collect_logs(container_id).await;
        Ok((exit_code, stdout, stderr))
    }

    async fn remove(&self, container_id: &str) {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        if let Err(e) = self.client.remove_container(container_id, Some(options)).await {
            warn!("Failed to remove container {}: {}", container_id, e);
        }
    }
}

#[async_trait]
impl ContainerRunner for DockerRunner {
    async fn is_available(&self) -> RunnerResult<bool> {
        Ok(self.client.ping().await.is_ok())
    }

    async fn version(&self) -> RunnerResult<String> {
        let version = self.client.version().await?;
        Ok(format!(
            "Docker {} (API {})",
            version.version.unwrap_or_default(),
            version.api_version.unwrap_or_default()
        ))
    }

    async fn image_exists(&self, image: &str, tag: &str) -> RunnerResult<bool> {
        match self.client.inspect_image(&format!("{}:{}", image, tag)).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn pull_image(&self, image: &str, tag: &str) -> RunnerResult<()> {
        info!("Pulling image {}:{}", image, tag);

        let options = CreateImageOptions {
            from_image: image,
            tag,
            ..Default::default()
        };

        let mut stream = self.client.create_image(Some(options), None, None);
        while let Some(progress) = stream.next().await {
            let progress = progress.map_err(|e| RunnerError::ImagePullFailed(e.to_string()))?;
            if let Some(status) = progress.status {
                debug!("Pull status: {}", status);
            }
        }

        Ok(())
    }

    async fn run_container(
        &self,
        config: &ContainerConfig,
        run_config: &RunConfig,
    ) -> RunnerResult<ExecutionResult> {
        let full_image = config.full_image();
        let name = Self::container_name(config.name_prefix.as_deref());
        let started_at = Utc::now();

        if run_config.pull_image && !self.image_exists(&config.image, &config.tag).await? {
            self.pull_image(&config.image, &config.tag).await?;
        }

        debug!(
            "Running {} as {} with env {:?}",
            full_image,
            name,
            config.env_keys()
        );

        let mounts = config
            .mounts
            .iter()
            .map(|m| Mount {
                target: Some(m.target.clone()),
                source: Some(m.source.to_string_lossy().to_string()),
                typ: Some(MountTypeEnum::BIND),
                read_only: Some(m.read_only),
                ..Default::default()
            })
            .collect();

        let host_config = HostConfig {
            mounts: Some(mounts),
            // removed by us after logs are read
            auto_remove: Some(false),
            memory: run_config.memory_limit,
            network_mode: config.network_mode.clone(),
            ..Default::default()
        };

        let container_config = Config {
            image: Some(full_image.clone()),
            cmd: (!config.command.is_empty()).then(|| config.command.clone()),
            working_dir: config.workdir.clone(),
            env: Some(config.env.iter().map(|(k, v)| format!("{}={}", k, v)).collect()),
            host_config: Some(host_config),
            ..Default::default()
        };

        let container = self
            .client
            .create_container(
                Some(CreateContainerOptions {
                    name: name.as_str(),
                    platform: None,
                }),
                container_config,
            )
            .await?;
        let container_id = container.id;

        let outcome = self.execute(&container_id, &name, run_config).await;
        // removed on every path, including start and wait failures
        self.remove(&container_id).await;
        let (exit_code, stdout, stderr) = outcome?;
        let finished_at = Utc::now();

        Ok(ExecutionResult {
            container_id,
            exit_code,
            stdout,
            stderr,
            started_at,
            finished_at,
            duration_ms: (finished_at - started_at).num_milliseconds().max(0) as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use bollard::container::ListContainersOptions;

    use super::*;

    async fn leftovers(runner: &DockerRunner, prefix: &str) -> usize {
        let mut filters = HashMap::new();
        filters.insert("name".to_string(), vec![prefix.to_string()]);
        let options = ListContainersOptions {
            all: true,
            filters,
            ..Default::default()
        };
        runner.client.list_containers(Some(options)).await.unwrap().len()
    }

    #[tokio::test]
    #[ignore = "requires a Docker daemon"]
    async fn test_failed_start_removes_container() {
        let runner = DockerRunner::new().await.unwrap();
        let config = ContainerConfig::new("busybox")
            .name_prefix("eksauto-start-failure")
            .command(vec!["/no/such/binary".to_string()]);

        let result = runner.run_container(&config, &RunConfig::default().timeout(60)).await;

        assert!(result.is_err());
        assert_eq!(leftovers(&runner, "eksauto-start-failure").await, 0);
    }

    #[tokio::test]
    #[ignore = "requires a Docker daemon"]
    async fn test_timeout_removes_container() {
        let runner = DockerRunner::new().await.unwrap();
        let config = ContainerConfig::new("busybox")
            .name_prefix("eksauto-timeout")
            .command(vec!["sleep".to_string(), "30".to_string()]);

        let err = runner
            .run_container(&config, &RunConfig::default().timeout(1))
            .await
            .unwrap_err();

        assert!(matches!(err, RunnerError::Timeout(1)));
        assert_eq!(leftovers(&runner, "eksauto-timeout").await, 0);
    }

    #[tokio::test]
    #[ignore = "requires a Docker daemon"]
    async fn test_failed_command_removes_container() {
        let runner = DockerRunner::new().await.unwrap();
        let config = ContainerConfig::new("busybox")
            .name_prefix("eksauto-exit-code")
            .command(vec!["sh".to_string(), "-c".to_string(), "echo boom >&2; exit 3".to_string()]);

        let result = runner.run_container(&config, &RunConfig::default().timeout(60)).await.unwrap();

        assert_eq!(result.exit_code, 3);
        assert!(result.stderr.contains("boom"));
        assert_eq!(leftovers(&runner, "eksauto-exit-code").await, 0);
    }
}
