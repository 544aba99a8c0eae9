//! Integration tests for the EKS auto-mode stack.

use std::sync::Arc;

use eksauto_core::{
    CoreError, DeferredEngine, OutputRef, PropertyValue, RecordedCall, RecordingEngine,
    ResourceKind, StackConfig, StackProgram,
};
use eksauto_iac::stack::{
    ACCESS_ENTRY, ACCESS_POLICY_ASSOCIATION, CLUSTER, CLUSTER_ADMIN_POLICY_ARN,
    CLUSTER_NAME_OUTPUT, CLUSTER_ROLE, EXISTING_USER, NODE_ROLE, PROJECT_NAME,
};
use eksauto_iac::{EksAutoStack, IacError, ManagedPolicy, ProgramValidator, PulumiProject};
use tempfile::tempdir;

fn alice_config() -> StackConfig {
    StackConfig::new(PROJECT_NAME, "dev")
        .with_value("iamUserName", "alice")
        .with_value("subnetList", vec!["subnet-1", "subnet-2"])
}

fn synth(config: StackConfig) -> StackProgram {
    EksAutoStack::synthesize(config, Arc::new(DeferredEngine::new())).unwrap()
}

fn output(source: &str, property: &str) -> PropertyValue {
    PropertyValue::Output(OutputRef::new(source, property))
}

#[test]
fn test_cluster_uses_configured_subnets_in_order() {
    let program = synth(alice_config());
    let cluster = program.resource(CLUSTER).unwrap();

    assert_eq!(cluster.kind, ResourceKind::EksCluster);
    let subnets: Vec<&str> = cluster
        .property("vpcConfig")
        .and_then(|v| v.get("subnetIds"))
        .and_then(|v| v.as_list())
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert_eq!(subnets, vec!["subnet-1", "subnet-2"]);

    assert_eq!(cluster.property("name").and_then(|v| v.as_str()), Some("blog-cluster"));
    assert_eq!(cluster.property("version").and_then(|v| v.as_str()), Some("1.30"));
    assert_eq!(
        cluster.property("bootstrapSelfManagedAddons").and_then(|v| v.as_bool()),
        Some(false)
    );
    assert_eq!(
        cluster
            .property("accessConfig")
            .and_then(|v| v.get("authenticationMode"))
            .and_then(|v| v.as_str()),
        Some("API")
    );
}

#[test]
fn test_cluster_wires_role_arns() {
    let program = synth(alice_config());
    let cluster = program.resource(CLUSTER).unwrap();

    assert_eq!(cluster.property("roleArn"), Some(&output(CLUSTER_ROLE, "arn")));
    let compute = cluster.property("computeConfig").unwrap();
    assert_eq!(compute.get("nodeRoleArn"), Some(&output(NODE_ROLE, "arn")));
    assert_eq!(compute.get("enabled").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(
        compute
            .get("nodePools")
            .and_then(|v| v.as_list())
            .map(|l| l.iter().filter_map(|p| p.as_str()).collect::<Vec<_>>()),
        Some(vec!["general-purpose"])
    );
}

#[test]
fn test_exports_cluster_name() {
    let program = synth(alice_config());

    assert_eq!(program.outputs.len(), 1);
    assert_eq!(program.outputs[CLUSTER_NAME_OUTPUT], output(CLUSTER, "name"));
}

#[test]
fn test_declaration_counts() {
    let engine = RecordingEngine::new().with_user("alice");
    EksAutoStack::synthesize(alice_config(), Arc::new(engine.clone())).unwrap();

    assert_eq!(engine.registered_of_kind(ResourceKind::IamRole), 2);
    assert_eq!(engine.registered_of_kind(ResourceKind::IamRolePolicyAttachment), 7);
    assert_eq!(engine.registered_of_kind(ResourceKind::EksCluster), 1);
    assert_eq!(engine.registered_of_kind(ResourceKind::EksAccessEntry), 1);
    assert_eq!(engine.registered_of_kind(ResourceKind::EksAccessPolicyAssociation), 1);

    let calls = engine.calls();
    let lookups = calls
        .iter()
        .filter(|c| matches!(c, RecordedCall::Invoke { .. }))
        .count();
    let exports = calls
        .iter()
        .filter(|c| matches!(c, RecordedCall::Export { .. }))
        .count();
    assert_eq!(lookups, 1);
    assert_eq!(exports, 1);
}

#[test]
fn test_cluster_depends_only_on_cluster_attachments() {
    let engine = RecordingEngine::new().with_user("alice");
    EksAutoStack::synthesize(alice_config(), Arc::new(engine.clone())).unwrap();

    let depends_on = engine
        .calls()
        .into_iter()
        .find_map(|c| match c {
            RecordedCall::Register { name, depends_on, .. } if name == CLUSTER => Some(depends_on),
            _ => None,
        })
        .unwrap();

    let expected: Vec<String> = ManagedPolicy::CLUSTER
        .iter()
        .map(|p| p.attachment_name("cluster"))
        .collect();
    assert_eq!(depends_on, expected);
    assert!(depends_on.iter().all(|d| !d.starts_with("node_")));
}

#[test]
fn test_policy_association_waits_for_access_entry() {
    let engine = RecordingEngine::new().with_user("alice");
    EksAutoStack::synthesize(alice_config(), Arc::new(engine.clone())).unwrap();

    let depends_on = engine
        .calls()
        .into_iter()
        .find_map(|c| match c {
            RecordedCall::Register { name, depends_on, .. } if name == ACCESS_POLICY_ASSOCIATION => {
                Some(depends_on)
            }
            _ => None,
        })
        .unwrap();

    assert_eq!(depends_on, vec![ACCESS_ENTRY.to_string()]);
}

#[test]
fn test_declaration_order() {
    let engine = RecordingEngine::new().with_user("alice");
    EksAutoStack::synthesize(alice_config(), Arc::new(engine.clone())).unwrap();

    let registered = engine.registered();
    let position = |name: &str| registered.iter().position(|r| r == name).unwrap();

    assert_eq!(&registered[..2], &[NODE_ROLE.to_string(), CLUSTER_ROLE.to_string()]);
    for policy in ManagedPolicy::CLUSTER {
        assert!(position(&policy.attachment_name("cluster")) < position(CLUSTER));
    }
    for policy in ManagedPolicy::NODE {
        assert!(position(&policy.attachment_name("node")) > position(CLUSTER));
    }
    assert!(position(ACCESS_ENTRY) < position(ACCESS_POLICY_ASSOCIATION));
}

#[test]
fn test_attachments_reference_role_names() {
    let program = synth(alice_config());

    for policy in ManagedPolicy::CLUSTER {
        let attachment = program.resource(&policy.attachment_name("cluster")).unwrap();
        assert_eq!(attachment.property("role"), Some(&output(CLUSTER_ROLE, "name")));
        assert_eq!(
            attachment.property("policyArn").and_then(|v| v.as_str()),
            Some(policy.arn().as_str())
        );
    }
    for policy in ManagedPolicy::NODE {
        let attachment = program.resource(&policy.attachment_name("node")).unwrap();
        assert_eq!(attachment.property("role"), Some(&output(NODE_ROLE, "name")));
    }
}

#[test]
fn test_role_trust_policies() {
    let program = synth(alice_config());

    let trust = |name: &str| -> serde_json::Value {
        let raw = program
            .resource(name)
            .and_then(|r| r.property("assumeRolePolicy"))
            .and_then(|v| v.as_str())
            .unwrap();
        serde_json::from_str(raw).unwrap()
    };

    let node = trust(NODE_ROLE);
    assert_eq!(node["Statement"][0]["Principal"]["Service"], "ec2.amazonaws.com");
    assert_eq!(node["Statement"][0]["Action"], serde_json::json!(["sts:AssumeRole"]));

    let cluster = trust(CLUSTER_ROLE);
    assert_eq!(cluster["Statement"][0]["Principal"]["Service"], "eks.amazonaws.com");
    assert_eq!(
        cluster["Statement"][0]["Action"],
        serde_json::json!(["sts:AssumeRole", "sts:TagSession"])
    );
}

#[test]
fn test_missing_user_name_declares_nothing() {
    let engine = RecordingEngine::new();
    let config = StackConfig::new(PROJECT_NAME, "dev").with_value("subnetList", vec!["subnet-1"]);

    let err = EksAutoStack::synthesize(config, Arc::new(engine.clone())).unwrap_err();
    assert!(err.to_string().contains("iamUserName"));
    assert_eq!(engine.call_count(), 0);
}

#[test]
fn test_missing_subnets_declares_nothing() {
    let engine = RecordingEngine::new();
    let config = StackConfig::new(PROJECT_NAME, "dev").with_value("iamUserName", "alice");

    let err = EksAutoStack::synthesize(config, Arc::new(engine.clone())).unwrap_err();
    assert!(matches!(err, IacError::Core(CoreError::MissingConfig(ref key)) if key == "subnetList"));
    assert_eq!(engine.call_count(), 0);
}

#[test]
fn test_rejected_resource_is_named() {
    let engine = RecordingEngine::new()
        .with_user("alice")
        .reject_resource(CLUSTER, "InvalidParameterException: subnets in one AZ");

    let err = EksAutoStack::synthesize(alice_config(), Arc::new(engine.clone())).unwrap_err();
    let message = err.to_string();
    assert!(message.contains(CLUSTER));
    assert!(message.contains("InvalidParameterException"));
    // nothing after the rejected cluster is declared
    assert!(!engine.registered().iter().any(|r| r.starts_with("node_")));
}

#[test]
fn test_unknown_user_fails_before_access_entry() {
    let engine = RecordingEngine::new().with_user("bob");

    let err = EksAutoStack::synthesize(alice_config(), Arc::new(engine.clone())).unwrap_err();
    assert!(err.to_string().contains("alice"));
    assert!(!engine.registered().contains(&ACCESS_ENTRY.to_string()));
}

#[test]
fn test_resolved_lookup_embeds_user_arn() {
    let engine = RecordingEngine::new().with_account("210987654321").with_user("alice");
    let program = EksAutoStack::synthesize(alice_config(), Arc::new(engine)).unwrap();

    let arn = "arn:aws:iam::210987654321:user/alice";
    let entry = program.resource(ACCESS_ENTRY).unwrap();
    assert_eq!(entry.property("principalArn").and_then(|v| v.as_str()), Some(arn));
    assert_eq!(entry.property("clusterName"), Some(&output(CLUSTER, "name")));

    let association = program.resource(ACCESS_POLICY_ASSOCIATION).unwrap();
    assert_eq!(association.property("principalArn").and_then(|v| v.as_str()), Some(arn));
    assert_eq!(
        association.property("policyArn").and_then(|v| v.as_str()),
        Some(CLUSTER_ADMIN_POLICY_ARN)
    );
    assert_eq!(
        association
            .property("accessScope")
            .and_then(|v| v.get("type"))
            .and_then(|v| v.as_str()),
        Some("cluster")
    );
}

#[test]
fn test_deferred_lookup_references_variable() {
    let program = synth(alice_config());

    assert!(program.lookup(EXISTING_USER).is_some());
    let entry = program.resource(ACCESS_ENTRY).unwrap();
    assert_eq!(entry.property("principalArn"), Some(&output(EXISTING_USER, "arn")));
}

#[test]
fn test_rendered_project_validates() {
    let program = synth(alice_config());
    let dir = tempdir().unwrap();

    let files = PulumiProject::new(dir.path()).write(&program).unwrap();
    assert!(files.stack_file.ends_with("Pulumi.dev.yaml"));

    let report = ProgramValidator::validate_dir(dir.path()).unwrap();
    let failures: Vec<_> = report.failures().map(|c| c.message.clone()).collect();
    assert!(report.passed, "validation failures: {:?}", failures);

    let doc = PulumiProject::new(dir.path()).load_document().unwrap();
    assert_eq!(doc["outputs"][CLUSTER_NAME_OUTPUT], serde_yaml::Value::from("${blog-cluster.name}"));
    assert_eq!(
        doc["variables"][EXISTING_USER]["fn::invoke"]["function"],
        serde_yaml::Value::from("aws:iam:getUser")
    );
    assert_eq!(
        doc["resources"][CLUSTER]["options"]["dependsOn"]
            .as_sequence()
            .map(|s| s.len()),
        Some(5)
    );
    assert_eq!(
        doc["resources"][ACCESS_POLICY_ASSOCIATION]["options"]["dependsOn"],
        serde_yaml::Value::Sequence(vec![serde_yaml::Value::from("${eksAccessEntry}")])
    );
}

#[test]
fn test_stack_settings_round_trip() {
    let program = synth(alice_config());
    let dir = tempdir().unwrap();
    let files = PulumiProject::new(dir.path()).write(&program).unwrap();

    let reloaded = StackConfig::load(&files.stack_file, PROJECT_NAME, "dev").unwrap();
    assert_eq!(reloaded.require_string("iamUserName").unwrap(), "alice");
    assert_eq!(
        reloaded.require_string_list("subnetList").unwrap(),
        vec!["subnet-1", "subnet-2"]
    );
}
