//! Engine commands - preview, up and destroy through a Pulumi container.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use eksauto_iac::{Deployer, EngineAction, ProgramValidator, PulumiProject, PulumiRunner};
use eksauto_runner::{ContainerRunner, DockerRunner, EngineImage, RunConfig};

use super::validate::{ensure_passed, print_report};
use super::StackArgs;

#[derive(Args)]
pub struct DeployArgs {
    #[command(flatten)]
    pub stack: StackArgs,

    /// Directory the project is rendered into before the engine runs
    #[arg(short, long, default_value = "pulumi")]
    pub out: PathBuf,

    /// Engine timeout in seconds (0 = no timeout)
    #[arg(long, default_value_t = 45 * 60)]
    pub timeout: u64,

    /// Engine image tag
    #[arg(long, default_value = EngineImage::PULUMI_TAG)]
    pub engine_tag: String,

    /// Host AWS config directory mounted read-only (defaults to ~/.aws)
    #[arg(long)]
    pub aws_config_dir: Option<PathBuf>,

    /// Skip static validation of the rendered project
    #[arg(long)]
    pub skip_validation: bool,
}

pub async fn preview(args: DeployArgs) -> Result<()> {
    run(args, EngineAction::Preview).await
}

pub async fn up(args: DeployArgs) -> Result<()> {
    run(args, EngineAction::Up).await
}

pub async fn destroy(args: DeployArgs) -> Result<()> {
    run(args, EngineAction::Destroy).await
}

async fn run(args: DeployArgs, action: EngineAction) -> Result<()> {
    let program = args.stack.synthesize()?;
    let project = PulumiProject::new(&args.out);
    project
        .write(&program)
        .with_context(|| format!("Failed to write project to {}", args.out.display()))?;

    if args.skip_validation {
        warn!("Skipping program validation");
    } else {
        let report = ProgramValidator::validate_dir(project.dir())?;
        print_report(&report);
        ensure_passed(&report)?;
    }

    let docker = DockerRunner::new()
        .await
        .context("Docker is required to run the engine")?;
    if !docker.is_available().await? {
        anyhow::bail!("Docker daemon is not reachable");
    }

    let mut runner = PulumiRunner::new(Arc::new(docker), program.stack())
        .with_image(EngineImage::PULUMI, &args.engine_tag)
        .with_run_config(RunConfig::default().timeout(args.timeout));
    if let Some(dir) = args.aws_config_dir.clone().or_else(default_aws_config_dir) {
        runner = runner.with_aws_config_dir(dir);
    }

    println!("🚀 pulumi {} for stack {}", action, program.stack());
    let report = Deployer::new(runner)
        .run(project.dir(), action)
        .await
        .with_context(|| format!("pulumi {} failed for stack {}", action, program.stack()))?;

    for step in &report.steps {
        info!("pulumi {} exited with {}", step.command, step.exit_code);
        print!("{}", step.output);
    }

    if !report.outputs.is_empty() {
        println!();
        println!("Outputs:");
        for (name, value) in &report.outputs {
            println!("   {}: {}", name, value);
        }
    }

    println!("✅ pulumi {} completed", action);
    Ok(())
}

fn default_aws_config_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".aws"))
}
