//! Stack configuration store.
//!
//! Reads the engine's per-stack settings file (`Pulumi.<stack>.yaml`) and
//! exposes typed accessors for the values a program requires. Keys are stored
//! namespaced as `<project>:<key>`; lookups accept either form.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::debug;

use crate::error::{CoreError, CoreResult};

/// On-disk layout of a stack settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackConfigFile {
    #[serde(default)]
    pub config: BTreeMap<String, Value>,
    /// Engine-owned top-level keys (secrets provider, encryption salt, ...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Configuration for one stack of a project.
#[derive(Debug, Clone)]
pub struct StackConfig {
    project: String,
    stack: String,
    values: BTreeMap<String, Value>,
    extra: BTreeMap<String, Value>,
}

impl StackConfig {
    /// Create an empty configuration.
    pub fn new(project: impl Into<String>, stack: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            stack: stack.into(),
            values: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Conventional settings file path for a stack inside a project directory.
    pub fn default_path(project_dir: &Path, stack: &str) -> PathBuf {
        project_dir.join(format!("Pulumi.{}.yaml", stack))
    }

    /// Load a stack settings file.
    pub fn load(
        path: &Path,
        project: impl Into<String>,
        stack: impl Into<String>,
    ) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound(path.to_path_buf()));
        }

        debug!("Reading stack config from {:?}", path);
        let content = fs::read_to_string(path)?;
        let file: StackConfigFile = if content.trim().is_empty() {
            StackConfigFile::default()
        } else {
            serde_yaml::from_str(&content)?
        };

        let mut config = Self::new(project, stack);
        config.values = file.config;
        config.extra = file.extra;
        Ok(config)
    }

    /// Write the configuration back in settings file layout.
    pub fn save(&self, path: &Path) -> CoreResult<()> {
        let content = serde_yaml::to_string(&self.to_file())?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn to_file(&self) -> StackConfigFile {
        StackConfigFile {
            config: self.values.clone(),
            extra: self.extra.clone(),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// Set a value, namespacing bare keys under the project.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        let key = self.qualify(key);
        self.values.insert(key, value.into());
    }

    pub fn with_value(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Apply a `key=value` override as given on the command line.
    pub fn apply_override(&mut self, assignment: &str) -> CoreResult<()> {
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| CoreError::InvalidConfig {
                key: assignment.to_string(),
                message: "expected key=value".to_string(),
            })?;

        let key = key.trim();
        if key.is_empty() {
            return Err(CoreError::InvalidConfig {
                key: assignment.to_string(),
                message: "empty key".to_string(),
            });
        }

        self.set(key, Value::String(value.to_string()));
        Ok(())
    }

    fn qualify(&self, key: &str) -> String {
        if key.contains(':') {
            key.to_string()
        } else {
            format!("{}:{}", self.project, key)
        }
    }

    /// Look up a raw value by bare or namespaced key. Null values count as unset.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values
            .get(&self.qualify(key))
            .or_else(|| self.values.get(key))
            .filter(|v| !v.is_null())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// All entries in namespaced form.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Read a required string value.
    pub fn require_string(&self, key: &str) -> CoreResult<String> {
        let value = self
            .get(key)
            .ok_or_else(|| CoreError::MissingConfig(key.to_string()))?;

        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Mapping(m) if m.contains_key("secure") => Err(CoreError::InvalidConfig {
                key: key.to_string(),
                message: "encrypted values must be decrypted before use".to_string(),
            }),
            _ => Err(CoreError::InvalidConfig {
                key: key.to_string(),
                message: "expected a string".to_string(),
            }),
        }
    }

    /// Read a required list of strings.
    ///
    /// Accepts a YAML sequence, or a string holding a JSON array (the form
    /// structured values take after `pulumi config set`).
    pub fn require_string_list(&self, key: &str) -> CoreResult<Vec<String>> {
        let value = self
            .get(key)
            .ok_or_else(|| CoreError::MissingConfig(key.to_string()))?;

        let invalid = |message: &str| CoreError::InvalidConfig {
            key: key.to_string(),
            message: message.to_string(),
        };

        match value {
            Value::Sequence(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    _ => Err(invalid("list items must be strings")),
                })
                .collect(),
            Value::String(raw) => serde_json::from_str::<Vec<String>>(raw)
                .map_err(|_| invalid("expected a list of strings")),
            _ => Err(invalid("expected a list of strings")),
        }
    }
}
