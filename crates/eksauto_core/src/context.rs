//! Deployment context: the single pass that builds a stack's declarations.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::StackConfig;
use crate::engine::{InvokeResult, ProvisioningEngine};
use crate::error::{CoreError, CoreResult};
use crate::resource::{
    InvokeRequest, OutputRef, PropertyValue, ResourceArgs, ResourceDeclaration, ResourceHandle,
    ResourceOptions,
};

/// A lookup made during declaration, with what the engine returned.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupDeclaration {
    pub request: InvokeRequest,
    pub result: InvokeResult,
}

/// Handle to a lookup result.
#[derive(Debug, Clone)]
pub struct LookupHandle {
    name: String,
    result: InvokeResult,
}

impl LookupHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of a result property; a reference when the engine deferred the call.
    pub fn get(&self, property: &str) -> CoreResult<PropertyValue> {
        match &self.result {
            InvokeResult::Resolved(values) => values
                .get(property)
                .map(|v| PropertyValue::String(v.clone()))
                .ok_or_else(|| CoreError::MissingProperty {
                    name: self.name.clone(),
                    property: property.to_string(),
                }),
            InvokeResult::Deferred => Ok(PropertyValue::Output(OutputRef::new(
                &self.name, property,
            ))),
        }
    }
}

/// Everything a program declared, in declaration order.
#[derive(Debug, Clone)]
pub struct StackProgram {
    pub config: StackConfig,
    pub resources: Vec<ResourceDeclaration>,
    pub lookups: Vec<LookupDeclaration>,
    pub outputs: BTreeMap<String, PropertyValue>,
}

impl StackProgram {
    pub fn project(&self) -> &str {
        self.config.project()
    }

    pub fn stack(&self) -> &str {
        self.config.stack()
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceDeclaration> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn lookup(&self, name: &str) -> Option<&LookupDeclaration> {
        self.lookups.iter().find(|l| l.request.name == name)
    }
}

/// Context a stack program declares its resources through.
pub struct DeploymentContext {
    config: StackConfig,
    engine: Arc<dyn ProvisioningEngine>,
    resources: Vec<ResourceDeclaration>,
    lookups: Vec<LookupDeclaration>,
    outputs: BTreeMap<String, PropertyValue>,
}

impl DeploymentContext {
    pub fn new(config: StackConfig, engine: Arc<dyn ProvisioningEngine>) -> Self {
        Self {
            config,
            engine,
            resources: Vec::new(),
            lookups: Vec::new(),
            outputs: BTreeMap::new(),
        }
    }

    /// Run a program to completion, stopping at its first error.
    pub fn run<F, E>(config: StackConfig, engine: Arc<dyn ProvisioningEngine>, program: F) -> Result<StackProgram, E>
    where
        F: FnOnce(&mut DeploymentContext) -> Result<(), E>,
    {
        info!(
            "Running stack {}/{} against {} engine",
            config.project(),
            config.stack(),
            engine.name()
        );

        let mut ctx = Self::new(config, engine);
        program(&mut ctx)?;

        info!(
            "Declared {} resources, {} lookups, {} outputs",
            ctx.resources.len(),
            ctx.lookups.len(),
            ctx.outputs.len()
        );
        Ok(ctx.finish())
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    pub fn resources(&self) -> &[ResourceDeclaration] {
        &self.resources
    }

    pub fn lookups(&self) -> &[LookupDeclaration] {
        &self.lookups
    }

    pub fn outputs(&self) -> &BTreeMap<String, PropertyValue> {
        &self.outputs
    }

    fn is_declared(&self, name: &str) -> bool {
        self.resources.iter().any(|r| r.name == name)
            || self.lookups.iter().any(|l| l.request.name == name)
    }

    fn check_references<'a>(
        &self,
        owner: &str,
        refs: impl IntoIterator<Item = &'a OutputRef>,
    ) -> CoreResult<()> {
        for r in refs {
            if !self.is_declared(&r.source) {
                return Err(CoreError::UnknownReference {
                    resource: owner.to_string(),
                    target: r.source.clone(),
                });
            }
        }
        Ok(())
    }

    /// Declare a resource.
    ///
    /// Every output it reads and every dependency it names must already be
    /// declared in this context.
    pub fn register_resource<A: ResourceArgs>(
        &mut self,
        name: &str,
        args: A,
        options: ResourceOptions,
    ) -> CoreResult<ResourceHandle> {
        if self.is_declared(name) {
            return Err(CoreError::DuplicateResource(name.to_string()));
        }

        let declaration = ResourceDeclaration {
            name: name.to_string(),
            kind: A::KIND,
            properties: args.into_properties(),
            depends_on: options
                .depends_on
                .iter()
                .map(|h| h.name().to_string())
                .collect(),
        };

        self.check_references(name, declaration.properties.values().flat_map(|v| v.references()))?;
        for dependency in &declaration.depends_on {
            if !self.resources.iter().any(|r| &r.name == dependency) {
                return Err(CoreError::UnknownReference {
                    resource: name.to_string(),
                    target: dependency.clone(),
                });
            }
        }

        self.engine
            .register_resource(&declaration)
            .map_err(|e| match e {
                CoreError::DeclarationFailed { .. } => e,
                other => CoreError::DeclarationFailed {
                    resource: name.to_string(),
                    message: other.to_string(),
                },
            })?;

        debug!(
            "Declared {} ({}) depending on {:?}",
            name, declaration.kind, declaration.depends_on
        );
        let handle = ResourceHandle::new(name, declaration.kind);
        self.resources.push(declaration);
        Ok(handle)
    }

    /// Call a read-only provider function and bind its result to `request.name`.
    pub fn invoke(&mut self, request: InvokeRequest) -> CoreResult<LookupHandle> {
        if self.is_declared(&request.name) {
            return Err(CoreError::DuplicateResource(request.name.clone()));
        }
        self.check_references(&request.name, request.args.values().flat_map(|v| v.references()))?;

        let result = self.engine.invoke(&request).map_err(|e| match e {
            CoreError::InvokeFailed { .. } => e,
            other => CoreError::InvokeFailed {
                name: request.name.clone(),
                function: request.function.clone(),
                message: other.to_string(),
            },
        })?;

        debug!("Looked up {} via {}", request.name, request.function);
        let handle = LookupHandle {
            name: request.name.clone(),
            result: result.clone(),
        };
        self.lookups.push(LookupDeclaration { request, result });
        Ok(handle)
    }

    /// Publish a stack output.
    pub fn export(&mut self, name: &str, value: impl Into<PropertyValue>) -> CoreResult<()> {
        if self.outputs.contains_key(name) {
            return Err(CoreError::DuplicateOutput(name.to_string()));
        }

        let value = value.into();
        self.check_references(name, value.references())?;
        self.engine.export(name, &value)?;
        self.outputs.insert(name.to_string(), value);
        Ok(())
    }

    pub fn finish(self) -> StackProgram {
        StackProgram {
            config: self.config,
            resources: self.resources,
            lookups: self.lookups,
            outputs: self.outputs,
        }
    }
}
