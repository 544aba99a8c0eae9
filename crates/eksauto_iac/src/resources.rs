//! Typed arguments for the AWS resources the stack declares.
//!
//! Each type converts into the provider's camelCase property tree.

use eksauto_core::{
    properties, InvokeRequest, PropertyMap, PropertyValue, ResourceArgs, ResourceKind,
    GET_USER_FUNCTION,
};

/// `aws:iam:Role`
#[derive(Debug, Clone)]
pub struct RoleArgs {
    pub name: String,
    pub assume_role_policy: String,
}

impl ResourceArgs for RoleArgs {
    const KIND: ResourceKind = ResourceKind::IamRole;

    fn into_properties(self) -> PropertyMap {
        properties! {
            "name" => self.name,
            "assumeRolePolicy" => self.assume_role_policy,
        }
    }
}

/// `aws:iam:RolePolicyAttachment`
#[derive(Debug, Clone)]
pub struct RolePolicyAttachmentArgs {
    pub policy_arn: String,
    /// Name of the role, usually another resource's output.
    pub role: PropertyValue,
}

impl ResourceArgs for RolePolicyAttachmentArgs {
    const KIND: ResourceKind = ResourceKind::IamRolePolicyAttachment;

    fn into_properties(self) -> PropertyMap {
        properties! {
            "policyArn" => self.policy_arn,
            "role" => self.role,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ComputeConfig {
    pub enabled: bool,
    pub node_pools: Vec<String>,
    pub node_role_arn: PropertyValue,
}

#[derive(Debug, Clone)]
pub struct VpcConfig {
    pub endpoint_private_access: bool,
    pub endpoint_public_access: bool,
    pub subnet_ids: Vec<String>,
}

/// `aws:eks:Cluster`
#[derive(Debug, Clone)]
pub struct ClusterArgs {
    pub name: String,
    pub authentication_mode: String,
    pub role_arn: PropertyValue,
    pub version: String,
    pub compute_config: ComputeConfig,
    pub elastic_load_balancing: bool,
    pub block_storage: bool,
    pub vpc_config: VpcConfig,
    pub bootstrap_self_managed_addons: bool,
}

impl ResourceArgs for ClusterArgs {
    const KIND: ResourceKind = ResourceKind::EksCluster;

    fn into_properties(self) -> PropertyMap {
        properties! {
            "name" => self.name,
            "accessConfig" => properties! {
                "authenticationMode" => self.authentication_mode,
            },
            "roleArn" => self.role_arn,
            "version" => self.version,
            "computeConfig" => properties! {
                "enabled" => self.compute_config.enabled,
                "nodePools" => self.compute_config.node_pools,
                "nodeRoleArn" => self.compute_config.node_role_arn,
            },
            "kubernetesNetworkConfig" => properties! {
                "elasticLoadBalancing" => properties! {
                    "enabled" => self.elastic_load_balancing,
                },
            },
            "storageConfig" => properties! {
                "blockStorage" => properties! {
                    "enabled" => self.block_storage,
                },
            },
            "vpcConfig" => properties! {
                "endpointPrivateAccess" => self.vpc_config.endpoint_private_access,
                "endpointPublicAccess" => self.vpc_config.endpoint_public_access,
                "subnetIds" => self.vpc_config.subnet_ids,
            },
            "bootstrapSelfManagedAddons" => self.bootstrap_self_managed_addons,
        }
    }
}

/// `aws:eks:AccessEntry`
#[derive(Debug, Clone)]
pub struct AccessEntryArgs {
    pub cluster_name: PropertyValue,
    pub principal_arn: PropertyValue,
}

impl ResourceArgs for AccessEntryArgs {
    const KIND: ResourceKind = ResourceKind::EksAccessEntry;

    fn into_properties(self) -> PropertyMap {
        properties! {
            "clusterName" => self.cluster_name,
            "principalArn" => self.principal_arn,
        }
    }
}

/// Where an access policy applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessScope {
    Cluster,
    Namespaces(Vec<String>),
}

impl AccessScope {
    fn into_properties(self) -> PropertyMap {
        match self {
            AccessScope::Cluster => properties! { "type" => "cluster" },
            AccessScope::Namespaces(namespaces) => properties! {
                "type" => "namespace",
                "namespaces" => namespaces,
            },
        }
    }
}

/// `aws:eks:AccessPolicyAssociation`
#[derive(Debug, Clone)]
pub struct AccessPolicyAssociationArgs {
    pub cluster_name: PropertyValue,
    pub principal_arn: PropertyValue,
    pub policy_arn: String,
    pub access_scope: AccessScope,
}

impl ResourceArgs for AccessPolicyAssociationArgs {
    const KIND: ResourceKind = ResourceKind::EksAccessPolicyAssociation;

    fn into_properties(self) -> PropertyMap {
        properties! {
            "clusterName" => self.cluster_name,
            "principalArn" => self.principal_arn,
            "policyArn" => self.policy_arn,
            "accessScope" => self.access_scope.into_properties(),
        }
    }
}

/// Lookup of an existing IAM user by name.
pub fn get_user(name: &str, user_name: &str) -> InvokeRequest {
    InvokeRequest::new(name, GET_USER_FUNCTION, properties! { "userName" => user_name })
}

#[cfg(test)]
mod tests {
    use super::*;
    use eksauto_core::OutputRef;

    #[test]
    fn test_namespace_scope_properties() {
        let props = AccessPolicyAssociationArgs {
            cluster_name: "c".into(),
            principal_arn: "p".into(),
            policy_arn: "arn".to_string(),
            access_scope: AccessScope::Namespaces(vec!["default".to_string()]),
        }
        .into_properties();

        let scope = &props["accessScope"];
        assert_eq!(scope.get("type").and_then(|v| v.as_str()), Some("namespace"));
        assert_eq!(scope.get("namespaces").and_then(|v| v.as_list()).map(|l| l.len()), Some(1));
    }

    #[test]
    fn test_attachment_keeps_role_reference() {
        let props = RolePolicyAttachmentArgs {
            policy_arn: "arn:aws:iam::aws:policy/AmazonEKSClusterPolicy".to_string(),
            role: OutputRef::new("clusterRole", "name").into(),
        }
        .into_properties();

        assert_eq!(
            props["role"].as_output(),
            Some(&OutputRef::new("clusterRole", "name"))
        );
    }
}
