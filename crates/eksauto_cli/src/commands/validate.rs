//! Validate command - Static checks on a rendered project.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use eksauto_iac::{IacError, ProgramValidator, PulumiProject, ValidationReport};

use super::StackArgs;

#[derive(Args)]
pub struct ValidateArgs {
    /// Validate an already rendered project instead of synthesizing one
    #[arg(long)]
    pub project_dir: Option<PathBuf>,

    #[command(flatten)]
    pub stack: StackArgs,
}

pub async fn execute(args: ValidateArgs) -> Result<()> {
    let report = match &args.project_dir {
        Some(dir) => ProgramValidator::validate_dir(dir)?,
        None => {
            let program = args.stack.synthesize()?;
            let document = PulumiProject::new(".").document(&program)?;
            ProgramValidator::validate_document(&document)
        }
    };

    print_report(&report);
    ensure_passed(&report)?;
    Ok(())
}

pub(crate) fn print_report(report: &ValidationReport) {
    println!("📋 Validating program...");
    for check in &report.checks {
        let mark = if check.passed { "✅" } else { "❌" };
        println!("   {} {}: {}", mark, check.name, check.message);
    }
}

pub(crate) fn ensure_passed(report: &ValidationReport) -> Result<(), IacError> {
    if report.passed {
        info!("All {} checks passed", report.checks.len());
        return Ok(());
    }

    let failed: Vec<&str> = report.failures().map(|c| c.name.as_str()).collect();
    Err(IacError::ValidationFailed(format!(
        "{} check(s) failed: {}",
        failed.len(),
        failed.join(", ")
    )))
}
