//! Plan command - List what the stack declares without touching the engine.

use std::sync::Arc;

use anyhow::Result;
use clap::{Args, ValueEnum};
use serde::Serialize;

use eksauto_core::{ProvisioningEngine, RecordingEngine, StackProgram};
use eksauto_iac::stack::IAM_USER_NAME_KEY;

use super::StackArgs;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PlanFormat {
    Text,
    Json,
}

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub stack: StackArgs,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: PlanFormat,

    /// Resolve the user lookup offline as if the user existed in this account
    #[arg(long, value_name = "ACCOUNT_ID")]
    pub account: Option<String>,
}

#[derive(Debug, Serialize)]
struct PlanEntry {
    name: String,
    #[serde(rename = "type")]
    type_token: String,
    depends_on: Vec<String>,
    references: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Plan {
    project: String,
    stack: String,
    lookups: Vec<String>,
    resources: Vec<PlanEntry>,
    outputs: Vec<String>,
}

impl Plan {
    fn from_program(program: &StackProgram) -> Self {
        Self {
            project: program.project().to_string(),
            stack: program.stack().to_string(),
            lookups: program
                .lookups
                .iter()
                .map(|l| format!("{} ({})", l.request.name, l.request.function))
                .collect(),
            resources: program
                .resources
                .iter()
                .map(|r| PlanEntry {
                    name: r.name.clone(),
                    type_token: r.kind.type_token().to_string(),
                    depends_on: r.depends_on.clone(),
                    references: r.referenced_sources().into_iter().map(str::to_string).collect(),
                })
                .collect(),
            outputs: program.outputs.keys().cloned().collect(),
        }
    }

    fn print_text(&self) {
        println!("📋 Stack {}/{}", self.project, self.stack);
        for lookup in &self.lookups {
            println!("   🔎 {}", lookup);
        }
        for resource in &self.resources {
            println!("   + {} ({})", resource.name, resource.type_token);
            if !resource.references.is_empty() {
                println!("       reads: {}", resource.references.join(", "));
            }
            if !resource.depends_on.is_empty() {
                println!("       after: {}", resource.depends_on.join(", "));
            }
        }
        for output in &self.outputs {
            println!("   → {}", output);
        }
        println!();
        println!("{} resources, {} lookups, {} outputs", self.resources.len(), self.lookups.len(), self.outputs.len());
    }
}

pub async fn execute(args: PlanArgs) -> Result<()> {
    let program = match &args.account {
        Some(account) => {
            let config = args.stack.load_config()?;
            let user = config.require_string(IAM_USER_NAME_KEY)?;
            let engine: Arc<dyn ProvisioningEngine> =
                Arc::new(RecordingEngine::new().with_account(account).with_user(user));
            args.stack.synthesize_with(engine)?
        }
        None => args.stack.synthesize()?,
    };

    let plan = Plan::from_program(&program);
    match args.format {
        PlanFormat::Text => plan.print_text(),
        PlanFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eksauto_core::{DeferredEngine, StackConfig};
    use eksauto_iac::EksAutoStack;

    #[test]
    fn test_plan_lists_cluster_dependencies() {
        let config = StackConfig::new("eks-auto", "dev")
            .with_value("iamUserName", "alice")
            .with_value("subnetList", vec!["subnet-1"]);
        let program = EksAutoStack::synthesize(config, Arc::new(DeferredEngine::new())).unwrap();

        let plan = Plan::from_program(&program);
        let cluster = plan.resources.iter().find(|r| r.name == "blog-cluster").unwrap();
        assert_eq!(cluster.type_token, "aws:eks:Cluster");
        assert_eq!(cluster.depends_on.len(), 5);
        assert!(cluster.references.contains(&"blog-eks-auto-mode-cluster".to_string()));
        assert_eq!(plan.outputs, vec!["clusterName"]);

        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["resources"][0]["type"], "aws:iam:Role");
    }
}
