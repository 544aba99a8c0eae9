//! # eksauto_iac
//!
//! The EKS auto-mode stack and everything needed to hand it to Pulumi.
//!
//! ## Features
//!
//! - Typed argument structs for the IAM and EKS resources the stack declares
//! - The stack program itself: roles, policy attachments, cluster, admin access
//! - Rendering of a declared program into a Pulumi YAML project
//! - Static validation of a rendered project
//! - Containerized `pulumi preview`/`up`/`destroy` runs
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use eksauto_core::{DeferredEngine, StackConfig};
//! use eksauto_iac::{EksAutoStack, PulumiProject};
//!
//! let config = StackConfig::new("eks-auto", "dev")
//!     .with_value("iamUserName", "alice")
//!     .with_value("subnetList", vec!["subnet-1", "subnet-2"]);
//!
//! let program = EksAutoStack::synthesize(config, Arc::new(DeferredEngine::new())).unwrap();
//! PulumiProject::new("./out").write(&program).unwrap();
//! ```

pub mod error;
pub mod policy;
pub mod project;
pub mod pulumi;
pub mod resources;
pub mod stack;
pub mod validator;

pub use error::{IacError, IacResult};
pub use policy::{Effect, PolicyDocument, Principal, Statement, TrustPolicy};
pub use project::{ProjectFiles, PulumiProject, PROJECT_FILE, RUNTIME};
pub use pulumi::{Deployer, DeploymentReport, EngineAction, EngineResult, PulumiRunner};
pub use resources::{
    get_user, AccessEntryArgs, AccessPolicyAssociationArgs, AccessScope, ClusterArgs,
    ComputeConfig, RoleArgs, RolePolicyAttachmentArgs, VpcConfig,
};
pub use stack::{EksAutoStack, ManagedPolicy, StackInputs};
pub use validator::{interpolation_roots, ProgramValidator, ValidationCheck, ValidationReport};
