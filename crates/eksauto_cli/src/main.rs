//! eksauto CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments or stack configuration
//! - 3: Validation failure
//! - 5: Engine or IaC error

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use eksauto_core::CoreError;
use eksauto_iac::IacError;

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const VALIDATION_FAILURE: u8 = 3;
    pub const IAC_ERROR: u8 = 5;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "eksauto=debug,warn"
    } else if cli.quiet {
        "warn"
    } else {
        "eksauto=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // a second init (tests, embedding) keeps the existing subscriber
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .try_init();

    let result = match cli.command {
        Commands::Synth(args) => commands::synth::execute(args).await,
        Commands::Plan(args) => commands::plan::execute(args).await,
        Commands::Validate(args) => commands::validate::execute(args).await,
        Commands::Preview(args) => commands::deploy::preview(args).await,
        Commands::Up(args) => commands::deploy::up(args).await,
        Commands::Destroy(args) => commands::deploy::destroy(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(err) = cause.downcast_ref::<IacError>() {
            return match err {
                IacError::Core(core) => categorize_core(core),
                IacError::ValidationFailed(_) => ExitCodes::VALIDATION_FAILURE,
                _ => ExitCodes::IAC_ERROR,
            };
        }
        if let Some(core) = cause.downcast_ref::<CoreError>() {
            return categorize_core(core);
        }
    }

    let msg = e.to_string().to_lowercase();
    if msg.contains("validation") {
        ExitCodes::VALIDATION_FAILURE
    } else if msg.contains("argument") || msg.contains("not found") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}

fn categorize_core(e: &CoreError) -> u8 {
    match e {
        CoreError::MissingConfig(_) | CoreError::InvalidConfig { .. } | CoreError::ConfigNotFound(_) => {
            ExitCodes::INVALID_ARGS
        }
        CoreError::DuplicateResource(_)
        | CoreError::UnknownReference { .. }
        | CoreError::DuplicateOutput(_) => ExitCodes::VALIDATION_FAILURE,
        CoreError::DeclarationFailed { .. }
        | CoreError::InvokeFailed { .. }
        | CoreError::MissingProperty { .. } => ExitCodes::IAC_ERROR,
        _ => ExitCodes::GENERAL_ERROR,
    }
}
