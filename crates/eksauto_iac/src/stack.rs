//! The EKS auto-mode stack.
//!
//! Declares, in order: the node and cluster IAM roles, the five cluster policy
//! attachments, the cluster (gated on those attachments), the two node policy
//! attachments, the admin user's access entry and policy association (gated on
//! the entry), and the `clusterName` output.

use std::sync::Arc;

use tracing::info;

use eksauto_core::{
    DeploymentContext, ProvisioningEngine, ResourceHandle, ResourceOptions, StackConfig,
    StackProgram,
};

use crate::error::IacResult;
use crate::policy::TrustPolicy;
use crate::resources::{
    get_user, AccessEntryArgs, AccessPolicyAssociationArgs, AccessScope, ClusterArgs,
    ComputeConfig, RoleArgs, RolePolicyAttachmentArgs, VpcConfig,
};

pub const PROJECT_NAME: &str = "eks-auto";

pub const IAM_USER_NAME_KEY: &str = "iamUserName";
pub const SUBNET_LIST_KEY: &str = "subnetList";
pub const CLUSTER_NAME_OUTPUT: &str = "clusterName";

pub const NODE_ROLE: &str = "node";
pub const NODE_ROLE_NAME: &str = "blog-eks-auto-node";
pub const CLUSTER_ROLE: &str = "blog-eks-auto-mode-cluster";
pub const CLUSTER_ROLE_NAME: &str = "blog-eks-auto-mode-cluster";

pub const CLUSTER: &str = "blog-cluster";
pub const CLUSTER_NAME: &str = "blog-cluster";
pub const KUBERNETES_VERSION: &str = "1.30";
pub const AUTHENTICATION_MODE: &str = "API";
pub const NODE_POOL: &str = "general-purpose";

pub const EXISTING_USER: &str = "existingUser";
pub const ACCESS_ENTRY: &str = "eksAccessEntry";
pub const ACCESS_POLICY_ASSOCIATION: &str = "eksAccessPolicyAssociation";
pub const CLUSTER_ADMIN_POLICY_ARN: &str =
    "arn:aws:eks::aws:cluster-access-policy/AmazonEKSClusterAdminPolicy";

/// AWS managed policies attached to the stack's roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagedPolicy {
    EksCluster,
    EksCompute,
    EksBlockStorage,
    EksLoadBalancing,
    EksNetworking,
    EksWorkerNodeMinimal,
    Ec2ContainerRegistryPullOnly,
}

impl ManagedPolicy {
    /// Policies the control plane needs before auto mode can manage compute,
    /// storage and load balancing.
    pub const CLUSTER: [ManagedPolicy; 5] = [
        ManagedPolicy::EksCluster,
        ManagedPolicy::EksCompute,
        ManagedPolicy::EksBlockStorage,
        ManagedPolicy::EksLoadBalancing,
        ManagedPolicy::EksNetworking,
    ];

    pub const NODE: [ManagedPolicy; 2] = [
        ManagedPolicy::EksWorkerNodeMinimal,
        ManagedPolicy::Ec2ContainerRegistryPullOnly,
    ];

    pub fn policy_name(&self) -> &'static str {
        match self {
            ManagedPolicy::EksCluster => "AmazonEKSClusterPolicy",
            ManagedPolicy::EksCompute => "AmazonEKSComputePolicy",
            ManagedPolicy::EksBlockStorage => "AmazonEKSBlockStoragePolicy",
            ManagedPolicy::EksLoadBalancing => "AmazonEKSLoadBalancingPolicy",
            ManagedPolicy::EksNetworking => "AmazonEKSNetworkingPolicy",
            ManagedPolicy::EksWorkerNodeMinimal => "AmazonEKSWorkerNodeMinimalPolicy",
            ManagedPolicy::Ec2ContainerRegistryPullOnly => "AmazonEC2ContainerRegistryPullOnly",
        }
    }

    pub fn arn(&self) -> String {
        format!("arn:aws:iam::aws:policy/{}", self.policy_name())
    }

    /// Logical name of the attachment binding this policy for `owner`.
    pub fn attachment_name(&self, owner: &str) -> String {
        format!("{}_{}", owner, self.policy_name())
    }
}

/// Settings the stack reads from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackInputs {
    pub iam_user_name: String,
    pub subnet_ids: Vec<String>,
}

impl StackInputs {
    /// Read both required settings; either missing aborts the run.
    pub fn from_config(config: &StackConfig) -> IacResult<Self> {
        let iam_user_name = config.require_string(IAM_USER_NAME_KEY)?;
        let subnet_ids = config.require_string_list(SUBNET_LIST_KEY)?;

        Ok(Self {
            iam_user_name,
            subnet_ids,
        })
    }
}

struct Roles {
    node: ResourceHandle,
    cluster: ResourceHandle,
}

/// The EKS auto-mode stack program.
pub struct EksAutoStack;

impl EksAutoStack {
    /// Run the program against an engine and return everything it declared.
    pub fn synthesize(
        config: StackConfig,
        engine: Arc<dyn ProvisioningEngine>,
    ) -> IacResult<StackProgram> {
        DeploymentContext::run(config, engine, Self::declare)
    }

    /// Declare the whole stack in one pass, stopping at the first error.
    pub fn declare(ctx: &mut DeploymentContext) -> IacResult<()> {
        let inputs = StackInputs::from_config(ctx.config())?;
        info!(
            "Declaring {} for user {} across {} subnets",
            CLUSTER_NAME,
            inputs.iam_user_name,
            inputs.subnet_ids.len()
        );

        let roles = Self::declare_roles(ctx)?;
        let cluster_attachments =
            Self::declare_attachments(ctx, "cluster", &roles.cluster, &ManagedPolicy::CLUSTER)?;
        let cluster = Self::declare_cluster(ctx, &roles, &inputs.subnet_ids, cluster_attachments)?;
        Self::declare_attachments(ctx, "node", &roles.node, &ManagedPolicy::NODE)?;
        Self::declare_access(ctx, &cluster, &inputs.iam_user_name)?;

        ctx.export(CLUSTER_NAME_OUTPUT, cluster.output("name"))?;
        Ok(())
    }

    fn declare_roles(ctx: &mut DeploymentContext) -> IacResult<Roles> {
        let node = ctx.register_resource(
            NODE_ROLE,
            RoleArgs {
                name: NODE_ROLE_NAME.to_string(),
                assume_role_policy: TrustPolicy::node().to_json(NODE_ROLE)?,
            },
            ResourceOptions::default(),
        )?;

        let cluster = ctx.register_resource(
            CLUSTER_ROLE,
            RoleArgs {
                name: CLUSTER_ROLE_NAME.to_string(),
                assume_role_policy: TrustPolicy::cluster().to_json(CLUSTER_ROLE)?,
            },
            ResourceOptions::default(),
        )?;

        Ok(Roles { node, cluster })
    }

    fn declare_attachments(
        ctx: &mut DeploymentContext,
        owner: &str,
        role: &ResourceHandle,
        policies: &[ManagedPolicy],
    ) -> IacResult<Vec<ResourceHandle>> {
        policies
            .iter()
            .map(|policy| -> IacResult<ResourceHandle> {
                let handle = ctx.register_resource(
                    &policy.attachment_name(owner),
                    RolePolicyAttachmentArgs {
                        policy_arn: policy.arn(),
                        role: role.output("name").into(),
                    },
                    ResourceOptions::default(),
                )?;
                Ok(handle)
            })
            .collect()
    }

    fn declare_cluster(
        ctx: &mut DeploymentContext,
        roles: &Roles,
        subnet_ids: &[String],
        attachments: Vec<ResourceHandle>,
    ) -> IacResult<ResourceHandle> {
        let args = ClusterArgs {
            name: CLUSTER_NAME.to_string(),
            authentication_mode: AUTHENTICATION_MODE.to_string(),
            role_arn: roles.cluster.output("arn").into(),
            version: KUBERNETES_VERSION.to_string(),
            compute_config: ComputeConfig {
                enabled: true,
                node_pools: vec![NODE_POOL.to_string()],
                node_role_arn: roles.node.output("arn").into(),
            },
            elastic_load_balancing: true,
            block_storage: true,
            vpc_config: VpcConfig {
                endpoint_private_access: true,
                endpoint_public_access: true,
                subnet_ids: subnet_ids.to_vec(),
            },
            // auto mode supplies the core add-ons itself
            bootstrap_self_managed_addons: false,
        };

        let cluster = ctx.register_resource(CLUSTER, args, ResourceOptions::depends_on(attachments))?;
        Ok(cluster)
    }

    fn declare_access(
        ctx: &mut DeploymentContext,
        cluster: &ResourceHandle,
        user_name: &str,
    ) -> IacResult<()> {
        let user = ctx.invoke(get_user(EXISTING_USER, user_name))?;
        let principal_arn = user.get("arn")?;

        let entry = ctx.register_resource(
            ACCESS_ENTRY,
            AccessEntryArgs {
                cluster_name: cluster.output("name").into(),
                principal_arn: principal_arn.clone(),
            },
            ResourceOptions::default(),
        )?;

        ctx.register_resource(
            ACCESS_POLICY_ASSOCIATION,
            AccessPolicyAssociationArgs {
                cluster_name: cluster.output("name").into(),
                principal_arn,
                policy_arn: CLUSTER_ADMIN_POLICY_ARN.to_string(),
                access_scope: AccessScope::Cluster,
            },
            // AWS rejects the association until the entry exists
            ResourceOptions::depends_on([entry]),
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_managed_policy_arns() {
        assert_eq!(
            ManagedPolicy::EksCluster.arn(),
            "arn:aws:iam::aws:policy/AmazonEKSClusterPolicy"
        );
        assert_eq!(
            ManagedPolicy::Ec2ContainerRegistryPullOnly.arn(),
            "arn:aws:iam::aws:policy/AmazonEC2ContainerRegistryPullOnly"
        );
    }

    #[test]
    fn test_attachment_names() {
        assert_eq!(
            ManagedPolicy::EksNetworking.attachment_name("cluster"),
            "cluster_AmazonEKSNetworkingPolicy"
        );
        assert_eq!(
            ManagedPolicy::EksWorkerNodeMinimal.attachment_name("node"),
            "node_AmazonEKSWorkerNodeMinimalPolicy"
        );
    }

    #[test]
    fn test_inputs_require_user_name() {
        let config = StackConfig::new(PROJECT_NAME, "dev").with_value(SUBNET_LIST_KEY, vec!["subnet-1"]);
        let err = StackInputs::from_config(&config).unwrap_err();
        assert_eq!(err.to_string(), "iamUserName config is required");
    }
}
