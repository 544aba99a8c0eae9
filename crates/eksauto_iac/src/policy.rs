//! IAM trust policy documents.

use serde::{Deserialize, Serialize};

use crate::error::{IacError, IacResult};

pub const POLICY_VERSION: &str = "2012-10-17";

pub const ASSUME_ROLE: &str = "sts:AssumeRole";
pub const TAG_SESSION: &str = "sts:TagSession";

pub const EC2_SERVICE: &str = "ec2.amazonaws.com";
pub const EKS_SERVICE: &str = "eks.amazonaws.com";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub action: Vec<String>,
    pub effect: Effect,
    pub principal: Principal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Principal {
    pub service: String,
}

/// Builder for a single-statement trust policy letting one service assume a role.
#[derive(Debug, Clone)]
pub struct TrustPolicy {
    service: String,
    actions: Vec<String>,
}

impl TrustPolicy {
    /// Trust `service` with `sts:AssumeRole`.
    pub fn for_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            actions: vec![ASSUME_ROLE.to_string()],
        }
    }

    /// Also allow `sts:TagSession`.
    pub fn with_tag_session(mut self) -> Self {
        if !self.actions.iter().any(|a| a == TAG_SESSION) {
            self.actions.push(TAG_SESSION.to_string());
        }
        self
    }

    /// Trust policy for EC2 instances backing cluster nodes.
    pub fn node() -> Self {
        Self::for_service(EC2_SERVICE)
    }

    /// Trust policy for the EKS control plane.
    pub fn cluster() -> Self {
        Self::for_service(EKS_SERVICE).with_tag_session()
    }

    pub fn document(&self) -> PolicyDocument {
        PolicyDocument {
            version: POLICY_VERSION.to_string(),
            statement: vec![Statement {
                action: self.actions.clone(),
                effect: Effect::Allow,
                principal: Principal {
                    service: self.service.clone(),
                },
            }],
        }
    }

    /// Compact JSON for the role's `assumeRolePolicy`.
    pub fn to_json(&self, role: &str) -> IacResult<String> {
        serde_json::to_string(&self.document()).map_err(|source| IacError::PolicySerialization {
            role: role.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_node_policy_allows_only_assume_role() {
        let json: Value = serde_json::from_str(&TrustPolicy::node().to_json("node").unwrap()).unwrap();

        assert_eq!(
            json,
            json!({
                "Version": "2012-10-17",
                "Statement": [{
                    "Action": ["sts:AssumeRole"],
                    "Effect": "Allow",
                    "Principal": {"Service": "ec2.amazonaws.com"}
                }]
            })
        );
    }

    #[test]
    fn test_cluster_policy_adds_tag_session() {
        let doc = TrustPolicy::cluster().document();

        assert_eq!(doc.statement.len(), 1);
        assert_eq!(doc.statement[0].action, vec![ASSUME_ROLE, TAG_SESSION]);
        assert_eq!(doc.statement[0].principal.service, EKS_SERVICE);
        assert_eq!(doc.statement[0].effect, Effect::Allow);
    }

    #[test]
    fn test_tag_session_not_duplicated() {
        let doc = TrustPolicy::cluster().with_tag_session().document();
        assert_eq!(doc.statement[0].action.len(), 2);
    }

    #[test]
    fn test_json_field_order() {
        let raw = TrustPolicy::node().to_json("node").unwrap();
        assert!(raw.starts_with(r#"{"Version":"2012-10-17","Statement":[{"Action":"#));
    }
}
