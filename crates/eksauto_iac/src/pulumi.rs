//! Pulumi CLI driver for containerized execution.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use eksauto_runner::{ContainerRunner, EngineImage, MountConfig, RunConfig};

use crate::error::{IacError, IacResult};

const CONTAINER_WORKDIR: &str = "/workspace";

/// What to ask the engine to do with a rendered project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineAction {
    Preview,
    Up,
    Destroy,
}

impl EngineAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineAction::Preview => "preview",
            EngineAction::Up => "up",
            EngineAction::Destroy => "destroy",
        }
    }
}

impl std::fmt::Display for EngineAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of one engine command.
#[derive(Debug, Clone)]
pub struct EngineResult {
    pub command: String,
    pub success: bool,
    pub output: String,
    pub exit_code: i64,
}

impl EngineResult {
    fn into_checked(self) -> IacResult<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(IacError::EngineFailed {
                command: self.command,
                exit_code: self.exit_code,
                output: self.output.trim().to_string(),
            })
        }
    }
}

/// Runs `pulumi` commands against a project directory inside a container.
pub struct PulumiRunner {
    runner: Arc<dyn ContainerRunner>,
    stack: String,
    image: String,
    tag: String,
    run_config: RunConfig,
    aws_config_dir: Option<PathBuf>,
}

impl PulumiRunner {
    pub fn new(runner: Arc<dyn ContainerRunner>, stack: impl Into<String>) -> Self {
        Self {
            runner,
            stack: stack.into(),
            image: EngineImage::PULUMI.to_string(),
            tag: EngineImage::PULUMI_TAG.to_string(),
            run_config: RunConfig::default(),
            aws_config_dir: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>, tag: impl Into<String>) -> Self {
        self.image = image.into();
        self.tag = tag.into();
        self
    }

    pub fn with_run_config(mut self, run_config: RunConfig) -> Self {
        self.run_config = run_config;
        self
    }

    /// Mount a host AWS config directory (credentials and profiles) read-only.
    pub fn with_aws_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.aws_config_dir = Some(dir.into());
        self
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// Select the stack, creating it first when `create` is set.
    pub async fn select_stack(&self, project_dir: &Path, create: bool) -> IacResult<EngineResult> {
        info!("Selecting stack {}", self.stack);
        let mut args = vec!["stack", "select", self.stack.as_str()];
        if create {
            args.push("--create");
        }
        self.run_command(project_dir, &args).await
    }

    pub async fn preview(&self, project_dir: &Path) -> IacResult<EngineResult> {
        info!("Running pulumi preview for stack {}", self.stack);
        self.run_command(project_dir, &["preview", "--stack", &self.stack, "--diff"])
            .await
    }

    pub async fn up(&self, project_dir: &Path) -> IacResult<EngineResult> {
        info!("Running pulumi up for stack {}", self.stack);
        self.run_command(
            project_dir,
            &["up", "--stack", &self.stack, "--yes", "--skip-preview"],
        )
        .await
    }

    pub async fn destroy(&self, project_dir: &Path) -> IacResult<EngineResult> {
        info!("Running pulumi destroy for stack {}", self.stack);
        self.run_command(project_dir, &["destroy", "--stack", &self.stack, "--yes"])
            .await
    }

    /// Read the stack's exported outputs.
    pub async fn outputs(
        &self,
        project_dir: &Path,
    ) -> IacResult<BTreeMap<String, serde_json::Value>> {
        let result = self
            .run_command(project_dir, &["stack", "output", "--stack", &self.stack, "--json"])
            .await?
            .into_checked()?;

        let raw = result.output.trim();
        if raw.is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(raw)?)
    }

    async fn run_command(&self, project_dir: &Path, args: &[&str]) -> IacResult<EngineResult> {
        let project_dir = project_dir.canonicalize()?;

        let mut command = vec!["pulumi".to_string()];
        command.extend(args.iter().map(|s| s.to_string()));
        command.push("--non-interactive".to_string());

        let mut config = EngineImage::pulumi()
            .tag(&self.tag)
            .workdir(CONTAINER_WORKDIR)
            .mount(MountConfig::new(project_dir, CONTAINER_WORKDIR))
            .env("PULUMI_SKIP_UPDATE_CHECK", "true")
            .env_passthrough(EngineImage::CREDENTIAL_ENV.iter().copied())
            .name_prefix("eksauto-pulumi")
            .command(command.clone());
        config.image = self.image.clone();

        if let Some(dir) = &self.aws_config_dir {
            if dir.exists() {
                config = config.mount(MountConfig::new(dir.clone(), "/root/.aws").read_only());
            } else {
                warn!("AWS config directory {:?} not found, not mounting", dir);
            }
        }

        debug!("Executing {:?}", command);
        let result = self.runner.run_container(&config, &self.run_config).await?;

        Ok(EngineResult {
            command: args.first().copied().unwrap_or_default().to_string(),
            success: result.success(),
            output: result.combined_output(),
            exit_code: result.exit_code,
        })
    }
}

/// Record of a deployment run.
#[derive(Debug, Default)]
pub struct DeploymentReport {
    pub steps: Vec<EngineResult>,
    pub outputs: BTreeMap<String, serde_json::Value>,
}

/// Drives an engine action end to end, stopping at the first failed step.
pub struct Deployer {
    runner: PulumiRunner,
}

impl Deployer {
    pub fn new(runner: PulumiRunner) -> Self {
        Self { runner }
    }

    pub async fn run(&self, project_dir: &Path, action: EngineAction) -> IacResult<DeploymentReport> {
        let mut report = DeploymentReport::default();

        // destroy only targets an existing stack
        let create = action != EngineAction::Destroy;
        let selected = self
            .runner
            .select_stack(project_dir, create)
            .await?
            .into_checked()?;
        report.steps.push(selected);

        let result = match action {
            EngineAction::Preview => self.runner.preview(project_dir).await?,
            EngineAction::Up => self.runner.up(project_dir).await?,
            EngineAction::Destroy => self.runner.destroy(project_dir).await?,
        };
        report.steps.push(result.into_checked()?);

        if action == EngineAction::Up {
            report.outputs = self.runner.outputs(project_dir).await?;
            info!("Stack {} exported {} outputs", self.runner.stack(), report.outputs.len());
        }

        Ok(report)
    }
}
