//! Static validation of a rendered project.
//!
//! Checks the `Pulumi.yaml` document on its own terms, without the engine:
//! known resource types, resolvable `${...}` references, `dependsOn` entries
//! naming declared resources, and outputs that resolve.

use std::collections::BTreeSet;
use std::path::Path;

use serde_yaml::Value;
use tracing::info;

use eksauto_core::ResourceKind;

use crate::error::IacResult;
use crate::project::{PulumiProject, RUNTIME};

/// Outcome of one check.
#[derive(Debug, Clone)]
pub struct ValidationCheck {
    pub name: String,
    pub passed: bool,
    pub message: String,
}

/// Validation report for a project.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub checks: Vec<ValidationCheck>,
    pub passed: bool,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            checks: Vec::new(),
            passed: true,
        }
    }

    pub fn add_check(&mut self, name: &str, passed: bool, message: impl Into<String>) {
        if !passed {
            self.passed = false;
        }
        self.checks.push(ValidationCheck {
            name: name.to_string(),
            passed,
            message: message.into(),
        });
    }

    pub fn failures(&self) -> impl Iterator<Item = &ValidationCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }

    pub fn check(&self, name: &str) -> Option<&ValidationCheck> {
        self.checks.iter().find(|c| c.name == name)
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract the root names of every `${root.path}` interpolation in `text`.
///
/// Escaped `$${...}` sequences are literals and are skipped.
pub fn interpolation_roots(text: &str) -> Vec<String> {
    let mut roots = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("${") {
        if rest[..start].ends_with('$') {
            rest = &rest[start + 2..];
            continue;
        }
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        let expr = &after[..end];
        let root = expr
            .split(|c: char| c == '.' || c == '[')
            .next()
            .unwrap_or_default()
            .trim();
        if !root.is_empty() {
            roots.push(root.to_string());
        }
        rest = &after[end + 1..];
    }

    roots
}

fn collect_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) => out.push(s),
        Value::Sequence(items) => items.iter().for_each(|i| collect_strings(i, out)),
        Value::Mapping(map) => map.values().for_each(|v| collect_strings(v, out)),
        Value::Tagged(tagged) => collect_strings(&tagged.value, out),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

fn mapping_keys(value: Option<&Value>) -> BTreeSet<String> {
    value
        .and_then(Value::as_mapping)
        .map(|m| m.keys().filter_map(|k| k.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

/// Validator for rendered projects.
pub struct ProgramValidator;

impl ProgramValidator {
    /// Validate the project in `dir`.
    pub fn validate_dir(dir: &Path) -> IacResult<ValidationReport> {
        info!("Validating project at {:?}", dir);
        let document = PulumiProject::new(dir).load_document()?;
        Ok(Self::validate_document(&document))
    }

    pub fn validate_document(document: &Value) -> ValidationReport {
        let mut report = ValidationReport::new();

        let runtime = document.get("runtime").and_then(Value::as_str);
        report.add_check(
            "runtime",
            runtime == Some(RUNTIME),
            format!("runtime is {}", runtime.unwrap_or("missing")),
        );

        let resources = document.get("resources").and_then(Value::as_mapping);
        let Some(resources) = resources.filter(|r| !r.is_empty()) else {
            report.add_check("resources", false, "no resources declared");
            return report;
        };

        let resource_names = mapping_keys(document.get("resources"));
        let mut known = resource_names.clone();
        known.extend(mapping_keys(document.get("variables")));
        known.extend(mapping_keys(document.get("config")));

        let mut unknown_types = Vec::new();
        let mut dangling = Vec::new();
        let mut bad_dependencies = Vec::new();

        for (name, entry) in resources {
            let name = name.as_str().unwrap_or("<non-string>");

            let token = entry.get("type").and_then(Value::as_str).unwrap_or("");
            if ResourceKind::from_token(token).is_none() {
                unknown_types.push(format!("{} ({})", name, token));
            }

            let mut strings = Vec::new();
            if let Some(properties) = entry.get("properties") {
                collect_strings(properties, &mut strings);
            }
            for root in strings.iter().flat_map(|s| interpolation_roots(s)) {
                if !known.contains(&root) {
                    dangling.push(format!("{} -> {}", name, root));
                }
            }

            let depends_on = entry
                .get("options")
                .and_then(|o| o.get("dependsOn"))
                .and_then(Value::as_sequence);
            for dependency in depends_on.into_iter().flatten() {
                let roots = dependency.as_str().map(interpolation_roots).unwrap_or_default();
                match roots.as_slice() {
                    [root] if resource_names.contains(root) && root != name => {}
                    _ => bad_dependencies.push(format!("{} -> {:?}", name, dependency)),
                }
            }
        }

        report.add_check(
            "resource-types",
            unknown_types.is_empty(),
            if unknown_types.is_empty() {
                format!("{} resources with known types", resources.len())
            } else {
                format!("unknown types: {}", unknown_types.join(", "))
            },
        );

        report.add_check(
            "references",
            dangling.is_empty(),
            if dangling.is_empty() {
                "all references resolve".to_string()
            } else {
                format!("unresolved: {}", dangling.join(", "))
            },
        );

        report.add_check(
            "depends-on",
            bad_dependencies.is_empty(),
            if bad_dependencies.is_empty() {
                "all dependencies name declared resources".to_string()
            } else {
                format!("invalid: {}", bad_dependencies.join(", "))
            },
        );

        let mut output_strings = Vec::new();
        if let Some(outputs) = document.get("outputs") {
            collect_strings(outputs, &mut output_strings);
        }
        let unresolved_outputs: Vec<String> = output_strings
            .iter()
            .flat_map(|s| interpolation_roots(s))
            .filter(|root| !known.contains(root))
            .collect();
        report.add_check(
            "outputs",
            unresolved_outputs.is_empty(),
            if unresolved_outputs.is_empty() {
                format!("{} outputs resolve", mapping_keys(document.get("outputs")).len())
            } else {
                format!("unresolved: {}", unresolved_outputs.join(", "))
            },
        );

        report
    }
}
