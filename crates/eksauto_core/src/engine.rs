//! Provisioning engine boundary.
//!
//! The engine receives declarations as they are made and decides how (and
//! when) they become real resources. Calls return immediately; creation,
//! ordering and retries happen on the engine's side.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::CoreResult;
use crate::resource::{InvokeRequest, PropertyValue, ResourceDeclaration};

/// Result of a provider function call.
#[derive(Debug, Clone, PartialEq)]
pub enum InvokeResult {
    /// Values known at declaration time.
    Resolved(BTreeMap<String, String>),
    /// Values the engine will compute when it executes the program.
    Deferred,
}

/// Engine receiving declarations.
pub trait ProvisioningEngine: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    /// Accept a resource declaration.
    fn register_resource(&self, declaration: &ResourceDeclaration) -> CoreResult<()>;

    /// Run a read-only provider function.
    fn invoke(&self, request: &InvokeRequest) -> CoreResult<InvokeResult>;

    /// Publish a named stack output.
    fn export(&self, name: &str, value: &PropertyValue) -> CoreResult<()>;
}

/// Engine that accepts everything and defers all lookups.
///
/// Used when the declarations are synthesized into a program the external
/// engine executes later, so nothing can be resolved up front.
#[derive(Debug, Default, Clone)]
pub struct DeferredEngine;

impl DeferredEngine {
    pub fn new() -> Self {
        Self
    }
}

impl ProvisioningEngine for DeferredEngine {
    fn name(&self) -> &str {
        "deferred"
    }

    fn register_resource(&self, declaration: &ResourceDeclaration) -> CoreResult<()> {
        debug!("Deferring {} ({})", declaration.name, declaration.kind);
        Ok(())
    }

    fn invoke(&self, request: &InvokeRequest) -> CoreResult<InvokeResult> {
        debug!("Deferring lookup {} ({})", request.name, request.function);
        Ok(InvokeResult::Deferred)
    }

    fn export(&self, name: &str, _value: &PropertyValue) -> CoreResult<()> {
        debug!("Deferring output {}", name);
        Ok(())
    }
}
