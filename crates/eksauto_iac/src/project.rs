//! Pulumi YAML project rendering.
//!
//! Turns a [`StackProgram`] into a project directory the engine can execute:
//! `Pulumi.yaml` holds the resources, lookups and outputs in declaration
//! order, `Pulumi.<stack>.yaml` carries the stack settings.

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tracing::{debug, info};

use eksauto_core::{PropertyValue, StackConfig, StackProgram};

use crate::error::{IacError, IacResult};

pub const PROJECT_FILE: &str = "Pulumi.yaml";
pub const RUNTIME: &str = "yaml";

const GITIGNORE: &str = "# engine working files\n.pulumi/\n*.bak\n";

/// Files written for one stack.
#[derive(Debug, Clone)]
pub struct ProjectFiles {
    pub project_file: PathBuf,
    pub stack_file: PathBuf,
}

/// Renders stack programs into a project directory.
pub struct PulumiProject {
    dir: PathBuf,
    description: String,
}

impl PulumiProject {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            description: "EKS auto-mode cluster with admin access for an existing IAM user".to_string(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn project_file(&self) -> PathBuf {
        self.dir.join(PROJECT_FILE)
    }

    /// Write the project, stack settings and ignore file.
    pub fn write(&self, program: &StackProgram) -> IacResult<ProjectFiles> {
        info!("Rendering project {} into {:?}", program.project(), self.dir);
        fs::create_dir_all(&self.dir)?;

        let project_file = self.project_file();
        fs::write(&project_file, self.render(program)?)?;

        let stack_file = StackConfig::default_path(&self.dir, program.stack());
        program.config.save(&stack_file)?;

        fs::write(self.dir.join(".gitignore"), GITIGNORE)?;

        debug!("Wrote {:?} and {:?}", project_file, stack_file);
        Ok(ProjectFiles {
            project_file,
            stack_file,
        })
    }

    /// Render `Pulumi.yaml` content.
    pub fn render(&self, program: &StackProgram) -> IacResult<String> {
        let document = self.document(program)?;
        Ok(serde_yaml::to_string(&document)?)
    }

    /// Build the project document.
    pub fn document(&self, program: &StackProgram) -> IacResult<Value> {
        let mut doc = Mapping::new();
        doc.insert("name".into(), program.project().into());
        doc.insert("runtime".into(), RUNTIME.into());
        doc.insert("description".into(), self.description.as_str().into());

        if !program.lookups.is_empty() {
            let mut variables = Mapping::new();
            for lookup in &program.lookups {
                let mut invoke = Mapping::new();
                invoke.insert("function".into(), lookup.request.function.as_str().into());
                invoke.insert(
                    "arguments".into(),
                    serde_yaml::to_value(PropertyValue::Map(lookup.request.args.clone()))?,
                );

                let mut entry = Mapping::new();
                entry.insert("fn::invoke".into(), Value::Mapping(invoke));
                variables.insert(lookup.request.name.as_str().into(), Value::Mapping(entry));
            }
            doc.insert("variables".into(), Value::Mapping(variables));
        }

        if program.resources.is_empty() {
            return Err(IacError::RenderFailed(format!(
                "stack {} declares no resources",
                program.stack()
            )));
        }

        let mut resources = Mapping::new();
        for resource in &program.resources {
            let mut entry = Mapping::new();
            entry.insert("type".into(), resource.kind.type_token().into());
            entry.insert(
                "properties".into(),
                serde_yaml::to_value(PropertyValue::Map(resource.properties.clone()))?,
            );

            if !resource.depends_on.is_empty() {
                let depends_on = resource
                    .depends_on
                    .iter()
                    .map(|name| Value::String(format!("${{{}}}", name)))
                    .collect();
                let mut options = Mapping::new();
                options.insert("dependsOn".into(), Value::Sequence(depends_on));
                entry.insert("options".into(), Value::Mapping(options));
            }

            resources.insert(resource.name.as_str().into(), Value::Mapping(entry));
        }
        doc.insert("resources".into(), Value::Mapping(resources));

        if !program.outputs.is_empty() {
            let mut outputs = Mapping::new();
            for (name, value) in &program.outputs {
                outputs.insert(name.as_str().into(), serde_yaml::to_value(value)?);
            }
            doc.insert("outputs".into(), Value::Mapping(outputs));
        }

        Ok(Value::Mapping(doc))
    }

    /// Read back a rendered project document.
    pub fn load_document(&self) -> IacResult<Value> {
        let content = fs::read_to_string(self.project_file())?;
        Ok(serde_yaml::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use eksauto_core::{properties, DeploymentContext, DeferredEngine, ResourceArgs, ResourceKind, ResourceOptions};
    use tempfile::tempdir;

    struct PlainRole;

    impl ResourceArgs for PlainRole {
        const KIND: ResourceKind = ResourceKind::IamRole;

        fn into_properties(self) -> eksauto_core::PropertyMap {
            properties! { "name" => "r" }
        }
    }

    struct DollarRole;

    impl ResourceArgs for DollarRole {
        const KIND: ResourceKind = ResourceKind::IamRole;

        fn into_properties(self) -> eksauto_core::PropertyMap {
            properties! { "name" => "x${blog-cluster.arn}" }
        }
    }

    #[test]
    fn test_literal_dollar_brace_is_escaped() {
        let mut ctx = DeploymentContext::new(
            StackConfig::new("eks-auto", "dev"),
            Arc::new(DeferredEngine::new()),
        );
        ctx.register_resource("role", DollarRole, ResourceOptions::default())
            .unwrap();
        let program = ctx.finish();

        let doc = PulumiProject::new("unused").document(&program).unwrap();
        assert_eq!(
            doc["resources"]["role"]["properties"]["name"],
            Value::from("x$${blog-cluster.arn}")
        );
        assert!(crate::ProgramValidator::validate_document(&doc).passed);
    }

    #[test]
    fn test_empty_program_is_rejected() {
        let program = DeploymentContext::new(
            StackConfig::new("eks-auto", "dev"),
            Arc::new(DeferredEngine::new()),
        )
        .finish();

        let err = PulumiProject::new("unused").render(&program).unwrap_err();
        assert!(matches!(err, IacError::RenderFailed(_)));
    }

    #[test]
    fn test_write_creates_files() {
        let mut ctx = DeploymentContext::new(
            StackConfig::new("eks-auto", "staging").with_value("aws:region", "eu-west-1"),
            Arc::new(DeferredEngine::new()),
        );
        ctx.register_resource("role", PlainRole, ResourceOptions::default())
            .unwrap();
        let program = ctx.finish();

        let dir = tempdir().unwrap();
        let files = PulumiProject::new(dir.path()).write(&program).unwrap();

        assert!(files.project_file.ends_with("Pulumi.yaml"));
        assert!(files.stack_file.ends_with("Pulumi.staging.yaml"));
        assert!(dir.path().join(".gitignore").exists());

        let stack = StackConfig::load(&files.stack_file, "eks-auto", "staging").unwrap();
        assert_eq!(stack.require_string("aws:region").unwrap(), "eu-west-1");

        let doc = PulumiProject::new(dir.path()).load_document().unwrap();
        assert_eq!(doc["runtime"], Value::from("yaml"));
        assert_eq!(doc["resources"]["role"]["type"], Value::from("aws:iam:Role"));
        assert!(doc.get("outputs").is_none());
    }
}
