//! In-memory engine for tests and dry runs.
//!
//! Records every call it receives and resolves user lookups from a table
//! instead of a live provider.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::engine::{InvokeResult, ProvisioningEngine};
use crate::error::{CoreError, CoreResult};
use crate::resource::{InvokeRequest, PropertyValue, ResourceDeclaration, ResourceKind};

pub const GET_USER_FUNCTION: &str = "aws:iam:getUser";

/// A call captured by the recording engine.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Register {
        name: String,
        kind: ResourceKind,
        depends_on: Vec<String>,
    },
    Invoke {
        name: String,
        function: String,
    },
    Export {
        name: String,
    },
}

impl RecordedCall {
    pub fn name(&self) -> &str {
        match self {
            RecordedCall::Register { name, .. }
            | RecordedCall::Invoke { name, .. }
            | RecordedCall::Export { name } => name,
        }
    }
}

#[derive(Clone)]
pub struct RecordingEngine {
    account_id: String,
    /// Known IAM users by name.
    users: Arc<RwLock<BTreeMap<String, String>>>,
    calls: Arc<RwLock<Vec<RecordedCall>>>,
    /// Resource name and message to reject with.
    rejection: Arc<RwLock<Option<(String, String)>>>,
}

impl Default for RecordingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self {
            account_id: "123456789012".to_string(),
            users: Arc::new(RwLock::new(BTreeMap::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
            rejection: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = account_id.into();
        self
    }

    /// Register an existing IAM user; its ARN is derived from the account.
    pub fn with_user(self, user_name: impl Into<String>) -> Self {
        let user_name = user_name.into();
        let arn = format!("arn:aws:iam::{}:user/{}", self.account_id, user_name);
        self.users.write().insert(user_name, arn);
        self
    }

    /// Reject the declaration with the given logical name.
    pub fn reject_resource(self, name: impl Into<String>, message: impl Into<String>) -> Self {
        *self.rejection.write() = Some((name.into(), message.into()));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.read().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().len()
    }

    /// Logical names of registered resources, in order.
    pub fn registered(&self) -> Vec<String> {
        self.calls
            .read()
            .iter()
            .filter_map(|c| match c {
                RecordedCall::Register { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn registered_of_kind(&self, kind: ResourceKind) -> usize {
        self.calls
            .read()
            .iter()
            .filter(|c| matches!(c, RecordedCall::Register { kind: k, .. } if *k == kind))
            .count()
    }

    fn record(&self, call: RecordedCall) {
        self.calls.write().push(call);
    }
}

impl ProvisioningEngine for RecordingEngine {
    fn name(&self) -> &str {
        "recording"
    }

    fn register_resource(&self, declaration: &ResourceDeclaration) -> CoreResult<()> {
        if let Some((name, message)) = self.rejection.read().as_ref() {
            if name == &declaration.name {
                return Err(CoreError::DeclarationFailed {
                    resource: name.clone(),
                    message: message.clone(),
                });
            }
        }

        self.record(RecordedCall::Register {
            name: declaration.name.clone(),
            kind: declaration.kind,
            depends_on: declaration.depends_on.clone(),
        });
        Ok(())
    }

    fn invoke(&self, request: &InvokeRequest) -> CoreResult<InvokeResult> {
        self.record(RecordedCall::Invoke {
            name: request.name.clone(),
            function: request.function.clone(),
        });

        let failed = |message: String| CoreError::InvokeFailed {
            name: request.name.clone(),
            function: request.function.clone(),
            message,
        };

        if request.function != GET_USER_FUNCTION {
            return Err(failed("unsupported function".to_string()));
        }

        let user_name = request
            .args
            .get("userName")
            .and_then(PropertyValue::as_str)
            .ok_or_else(|| failed("userName argument is required".to_string()))?;

        let arn = self
            .users
            .read()
            .get(user_name)
            .cloned()
            .ok_or_else(|| failed(format!("user {} does not exist", user_name)))?;

        let mut values = BTreeMap::new();
        values.insert("arn".to_string(), arn);
        values.insert("userName".to_string(), user_name.to_string());
        values.insert("path".to_string(), "/".to_string());
        Ok(InvokeResult::Resolved(values))
    }

    fn export(&self, name: &str, _value: &PropertyValue) -> CoreResult<()> {
        self.record(RecordedCall::Export {
            name: name.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties;

    #[test]
    fn test_resolves_known_user() {
        let engine = RecordingEngine::new().with_user("alice");
        let request = InvokeRequest::new("u", GET_USER_FUNCTION, properties! { "userName" => "alice" });

        match engine.invoke(&request).unwrap() {
            InvokeResult::Resolved(values) => {
                assert_eq!(values["arn"], "arn:aws:iam::123456789012:user/alice");
            }
            InvokeResult::Deferred => panic!("expected resolved lookup"),
        }
        assert_eq!(engine.call_count(), 1);
    }

    #[test]
    fn test_unknown_user_fails() {
        let engine = RecordingEngine::new();
        let request = InvokeRequest::new("u", GET_USER_FUNCTION, properties! { "userName" => "mallory" });

        let err = engine.invoke(&request).unwrap_err();
        assert!(err.to_string().contains("mallory does not exist"));
    }

    #[test]
    fn test_rejection() {
        let engine = RecordingEngine::new().reject_resource("blog-cluster", "quota exceeded");
        let decl = ResourceDeclaration {
            name: "blog-cluster".to_string(),
            kind: ResourceKind::EksCluster,
            properties: properties! {},
            depends_on: Vec::new(),
        };

        let err = engine.register_resource(&decl).unwrap_err();
        assert_eq!(err.to_string(), "Declaration of blog-cluster failed: quota exceeded");
        assert!(engine.registered().is_empty());
    }
}
