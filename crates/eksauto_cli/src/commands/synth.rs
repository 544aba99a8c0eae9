//! Synth command - Render the stack as a Pulumi YAML project.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use eksauto_iac::PulumiProject;

use super::StackArgs;

#[derive(Args)]
pub struct SynthArgs {
    #[command(flatten)]
    pub stack: StackArgs,

    /// Output directory for the rendered project
    #[arg(short, long, default_value = "pulumi")]
    pub out: PathBuf,

    /// Print Pulumi.yaml instead of writing files
    #[arg(long)]
    pub stdout: bool,
}

pub async fn execute(args: SynthArgs) -> Result<()> {
    let program = args.stack.synthesize()?;
    let project = PulumiProject::new(&args.out);

    if args.stdout {
        print!("{}", project.render(&program)?);
        return Ok(());
    }

    let files = project
        .write(&program)
        .with_context(|| format!("Failed to write project to {}", args.out.display()))?;
    info!("Rendered {} resources", program.resources.len());

    println!("✅ Synthesized stack {}", program.stack());
    println!("   {}", files.project_file.display());
    println!("   {}", files.stack_file.display());

    Ok(())
}
