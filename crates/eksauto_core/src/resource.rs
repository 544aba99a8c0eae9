//! Resource declaration model.
//!
//! Declarations are desired-state records: a logical name, a provider type,
//! a property tree and explicit dependency edges. Values produced by other
//! resources appear as [`OutputRef`]s and are resolved by the engine.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// Provider resource types this workspace declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    IamRole,
    IamRolePolicyAttachment,
    EksCluster,
    EksAccessEntry,
    EksAccessPolicyAssociation,
}

impl ResourceKind {
    /// Provider type token.
    pub fn type_token(&self) -> &'static str {
        match self {
            ResourceKind::IamRole => "aws:iam:Role",
            ResourceKind::IamRolePolicyAttachment => "aws:iam:RolePolicyAttachment",
            ResourceKind::EksCluster => "aws:eks:Cluster",
            ResourceKind::EksAccessEntry => "aws:eks:AccessEntry",
            ResourceKind::EksAccessPolicyAssociation => "aws:eks:AccessPolicyAssociation",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "aws:iam:Role" => Some(ResourceKind::IamRole),
            "aws:iam:RolePolicyAttachment" => Some(ResourceKind::IamRolePolicyAttachment),
            "aws:eks:Cluster" => Some(ResourceKind::EksCluster),
            "aws:eks:AccessEntry" => Some(ResourceKind::EksAccessEntry),
            "aws:eks:AccessPolicyAssociation" => Some(ResourceKind::EksAccessPolicyAssociation),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_token())
    }
}

/// Reference to a property another declaration will produce.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputRef {
    /// Logical name of the resource or lookup producing the value.
    pub source: String,
    pub property: String,
}

impl OutputRef {
    pub fn new(source: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            property: property.into(),
        }
    }

    /// `${source.property}` interpolation form.
    pub fn interpolation(&self) -> String {
        format!("${{{}.{}}}", self.source, self.property)
    }
}

impl std::fmt::Display for OutputRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.source, self.property)
    }
}

pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// A declared property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    String(String),
    Bool(bool),
    List(Vec<PropertyValue>),
    Map(PropertyMap),
    Output(OutputRef),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[PropertyValue]> {
        match self {
            PropertyValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_output(&self) -> Option<&OutputRef> {
        match self {
            PropertyValue::Output(r) => Some(r),
            _ => None,
        }
    }

    /// Index into a nested map.
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        match self {
            PropertyValue::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Every output reference in this value, depth first.
    pub fn references(&self) -> Vec<&OutputRef> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references<'a>(&'a self, refs: &mut Vec<&'a OutputRef>) {
        match self {
            PropertyValue::Output(r) => refs.push(r),
            PropertyValue::List(items) => items.iter().for_each(|i| i.collect_references(refs)),
            PropertyValue::Map(map) => map.values().for_each(|v| v.collect_references(refs)),
            PropertyValue::String(_) | PropertyValue::Bool(_) => {}
        }
    }
}

/// Escape `${` in a literal so the engine does not read it as an interpolation.
fn escape_literal(s: &str) -> Cow<'_, str> {
    if s.contains("${") {
        Cow::Owned(s.replace("${", "$${"))
    } else {
        Cow::Borrowed(s)
    }
}

/// Outputs serialize as `${source.property}` and literals are escaped, so a
/// declaration tree can be written straight into an engine program.
impl Serialize for PropertyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PropertyValue::String(s) => serializer.serialize_str(&escape_literal(s)),
            PropertyValue::Bool(b) => serializer.serialize_bool(*b),
            PropertyValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            PropertyValue::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            PropertyValue::Output(r) => serializer.serialize_str(&r.interpolation()),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

impl From<OutputRef> for PropertyValue {
    fn from(r: OutputRef) -> Self {
        PropertyValue::Output(r)
    }
}

impl From<PropertyMap> for PropertyValue {
    fn from(m: PropertyMap) -> Self {
        PropertyValue::Map(m)
    }
}

impl<T: Into<PropertyValue>> From<Vec<T>> for PropertyValue {
    fn from(items: Vec<T>) -> Self {
        PropertyValue::List(items.into_iter().map(Into::into).collect())
    }
}

/// Build a [`PropertyMap`] from `key => value` pairs.
#[macro_export]
macro_rules! properties {
    ($($key:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut map = $crate::resource::PropertyMap::new();
        $(map.insert($key.to_string(), $crate::resource::PropertyValue::from($value));)*
        map
    }};
}

/// Typed arguments for one resource type.
pub trait ResourceArgs {
    const KIND: ResourceKind;

    fn into_properties(self) -> PropertyMap;
}

/// Per-declaration options.
#[derive(Debug, Clone, Default)]
pub struct ResourceOptions {
    pub depends_on: Vec<ResourceHandle>,
}

impl ResourceOptions {
    pub fn depends_on(handles: impl IntoIterator<Item = ResourceHandle>) -> Self {
        Self {
            depends_on: handles.into_iter().collect(),
        }
    }
}

/// A registered desired-state record.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDeclaration {
    pub name: String,
    pub kind: ResourceKind,
    pub properties: PropertyMap,
    /// Explicit ordering edges, by logical name, in declaration order.
    pub depends_on: Vec<String>,
}

impl ResourceDeclaration {
    /// Logical names this declaration reads outputs from.
    pub fn referenced_sources(&self) -> BTreeSet<&str> {
        self.properties
            .values()
            .flat_map(|v| v.references())
            .map(|r| r.source.as_str())
            .collect()
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }
}

/// Handle to a declared, not-yet-created resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    name: String,
    kind: ResourceKind,
}

impl ResourceHandle {
    pub fn new(name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Reference to a property the engine will resolve after creation.
    pub fn output(&self, property: &str) -> OutputRef {
        OutputRef::new(&self.name, property)
    }
}

/// Read-only provider function call (e.g. looking up an existing principal).
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeRequest {
    /// Logical name the result is bound to.
    pub name: String,
    /// Provider function token, e.g. `aws:iam:getUser`.
    pub function: String,
    pub args: PropertyMap,
}

impl InvokeRequest {
    pub fn new(name: impl Into<String>, function: impl Into<String>, args: PropertyMap) -> Self {
        Self {
            name: name.into(),
            function: function.into(),
            args,
        }
    }
}
