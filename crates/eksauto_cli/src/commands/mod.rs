//! CLI command definitions.
//!
//! Every command synthesizes the EKS auto-mode stack from a stack
//! configuration first; they differ in what happens to the result.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use eksauto_core::{DeferredEngine, ProvisioningEngine, StackConfig, StackProgram};
use eksauto_iac::stack::PROJECT_NAME;
use eksauto_iac::EksAutoStack;

pub mod deploy;
pub mod plan;
pub mod synth;
pub mod validate;

/// eksauto - EKS auto-mode cluster provisioning
#[derive(Parser)]
#[command(name = "eksauto")]
#[command(version, about = "eksauto - EKS auto-mode cluster provisioning")]
#[command(long_about = r#"
eksauto declares an EKS cluster in auto mode, the IAM roles it needs and
cluster-admin access for an existing IAM user, then hands the declarations
to Pulumi.

COMMANDS:
  synth     → Render the stack as a Pulumi YAML project
  plan      → List every declaration with its dependencies
  validate  → Check a rendered project for dangling references
  preview   → Run `pulumi preview` in a container
  up        → Run `pulumi up` in a container
  destroy   → Run `pulumi destroy` in a container

STACK CONFIG (Pulumi.<stack>.yaml):
  eks-auto:iamUserName  existing IAM user granted cluster admin
  eks-auto:subnetList   subnets for the cluster VPC config

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments or stack configuration
  3 - Validation failure
  5 - Engine or IaC error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render the stack into a Pulumi YAML project
    Synth(synth::SynthArgs),

    /// List declared resources, lookups and outputs
    Plan(plan::PlanArgs),

    /// Validate a rendered project
    Validate(validate::ValidateArgs),

    /// Preview changes with the engine
    Preview(deploy::DeployArgs),

    /// Create or update the stack
    Up(deploy::DeployArgs),

    /// Tear the stack down
    Destroy(deploy::DeployArgs),
}

/// Options shared by every command that synthesizes the stack.
#[derive(Args, Debug, Clone)]
pub struct StackArgs {
    /// Directory holding the stack settings file
    #[arg(short, long, default_value = ".")]
    pub dir: PathBuf,

    /// Stack name
    #[arg(short, long, env = "EKSAUTO_STACK", default_value = "dev")]
    pub stack: String,

    /// Stack settings file (defaults to <dir>/Pulumi.<stack>.yaml)
    #[arg(long, env = "EKSAUTO_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Override a config value (repeatable), e.g. --set iamUserName=alice
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,

    /// Project name used to namespace config keys
    #[arg(long, default_value = PROJECT_NAME)]
    pub project: String,
}

impl StackArgs {
    /// Load the stack settings and apply command-line overrides.
    pub fn load_config(&self) -> Result<StackConfig> {
        let path = self
            .config_file
            .clone()
            .unwrap_or_else(|| StackConfig::default_path(&self.dir, &self.stack));

        let mut config = if path.exists() {
            StackConfig::load(&path, &self.project, &self.stack)
                .with_context(|| format!("Failed to load stack config {}", path.display()))?
        } else if self.config_file.is_some() {
            anyhow::bail!("Stack config not found: {}", path.display());
        } else {
            warn!("No stack config at {}, using overrides only", path.display());
            StackConfig::new(&self.project, &self.stack)
        };

        for assignment in &self.overrides {
            config
                .apply_override(assignment)
                .with_context(|| format!("Invalid --set argument: {}", assignment))?;
        }

        Ok(config)
    }

    /// Run the stack program against `engine`.
    pub fn synthesize_with(&self, engine: Arc<dyn ProvisioningEngine>) -> Result<StackProgram> {
        let config = self.load_config()?;
        info!("Synthesizing stack {}", config.stack());
        let program = EksAutoStack::synthesize(config, engine)
            .with_context(|| format!("Failed to declare stack {}", self.stack))?;
        Ok(program)
    }

    pub fn synthesize(&self) -> Result<StackProgram> {
        self.synthesize_with(Arc::new(DeferredEngine::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn args(dir: PathBuf) -> StackArgs {
        StackArgs {
            dir,
            stack: "dev".to_string(),
            config_file: None,
            overrides: Vec::new(),
            project: PROJECT_NAME.to_string(),
        }
    }

    #[test]
    fn test_overrides_without_settings_file() {
        let dir = tempdir().unwrap();
        let mut stack_args = args(dir.path().to_path_buf());
        stack_args.overrides = vec![
            "iamUserName=alice".to_string(),
            r#"subnetList=["subnet-1","subnet-2"]"#.to_string(),
        ];

        let program = stack_args.synthesize().unwrap();
        assert_eq!(program.resources.len(), 12);
        assert_eq!(program.lookups.len(), 1);
    }

    #[test]
    fn test_override_wins_over_file() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("Pulumi.dev.yaml"),
            "config:\n  eks-auto:iamUserName: alice\n",
        )
        .unwrap();
        let mut stack_args = args(dir.path().to_path_buf());
        stack_args.overrides = vec!["eks-auto:iamUserName=bob".to_string()];

        let config = stack_args.load_config().unwrap();
        assert_eq!(config.require_string("iamUserName").unwrap(), "bob");
    }

    #[test]
    fn test_explicit_missing_file_fails() {
        let dir = tempdir().unwrap();
        let mut stack_args = args(dir.path().to_path_buf());
        stack_args.config_file = Some(dir.path().join("nope.yaml"));

        assert!(stack_args.load_config().is_err());
    }
}
