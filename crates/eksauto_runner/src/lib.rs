//! # eksauto_runner
//!
//! Container execution for the provisioning engine CLI.
//!
//! The engine runs from its published image so the host only needs Docker.
//! [`DockerRunner`] talks to the daemon through bollard; [`MockRunner`]
//! replays canned responses in tests.

pub mod config;
pub mod docker;
pub mod error;
pub mod mock;
pub mod runner;

pub use config::{ContainerConfig, EngineImage, MountConfig, RunConfig};
pub use docker::DockerRunner;
pub use error::{RunnerError, RunnerResult};
pub use mock::{CapturedRun, MockResponse, MockRunner};
pub use runner::{ContainerRunner, ExecutionResult};
