//! # eksauto_core
//!
//! Declaration layer for eksauto stacks.
//!
//! A stack program reads its settings from a [`StackConfig`], then declares
//! resources, lookups and outputs through a [`DeploymentContext`]. Each
//! declaration is handed to a [`ProvisioningEngine`], which owns creation,
//! ordering and state. This crate never talks to a cloud API itself.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use eksauto_core::{DeferredEngine, DeploymentContext, StackConfig};
//!
//! let config = StackConfig::new("eks-auto", "dev").with_value("iamUserName", "alice");
//! let program = DeploymentContext::run(config, Arc::new(DeferredEngine::new()), |ctx| {
//!     // ctx.register_resource(...)?;
//!     Ok::<_, eksauto_core::CoreError>(())
//! })?;
//! ```

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod recording;
pub mod resource;

pub use config::{StackConfig, StackConfigFile};
pub use context::{DeploymentContext, LookupDeclaration, LookupHandle, StackProgram};
pub use engine::{DeferredEngine, InvokeResult, ProvisioningEngine};
pub use error::{CoreError, CoreResult};
pub use recording::{RecordedCall, RecordingEngine, GET_USER_FUNCTION};
pub use resource::{
    InvokeRequest, OutputRef, PropertyMap, PropertyValue, ResourceArgs, ResourceDeclaration,
    ResourceHandle, ResourceKind, ResourceOptions,
};
