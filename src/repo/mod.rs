//! Narrow contract to the content-repository engine.
//!
//! The engine itself (storage, querying, versioning, access control) lives
//! behind these traits; everything above them only sees plain exchange data.
//! [`memory`] ships an in-memory engine for the demo server and the tests.

pub mod memory;

use crate::escape::SiblingName;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

pub use memory::MemoryRepository;

/// Primary type of a workspace root.
pub const ROOT_TYPE: &str = "sys:root";
/// Default primary type for nodes created without an explicit one.
pub const UNSTRUCTURED_TYPE: &str = "sys:unstructured";
/// Mixin that marks a node as carrying a version history.
pub const VERSIONABLE_MIXIN: &str = "sys:versionable";

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("no such item: {0}")]
    NotFound(String),
    #[error("{0}")]
    Backend(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Value type of a property. The reference-like kinds carry node identifiers
/// or paths and get `target` links in their representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    String,
    Boolean,
    Long,
    Double,
    Date,
    Name,
    Reference,
    WeakReference,
    Path,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::String => "string",
            PropertyType::Boolean => "boolean",
            PropertyType::Long => "long",
            PropertyType::Double => "double",
            PropertyType::Date => "date",
            PropertyType::Name => "name",
            PropertyType::Reference => "reference",
            PropertyType::WeakReference => "weakreference",
            PropertyType::Path => "path",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "string" => Some(PropertyType::String),
            "boolean" => Some(PropertyType::Boolean),
            "long" => Some(PropertyType::Long),
            "double" => Some(PropertyType::Double),
            "date" => Some(PropertyType::Date),
            "name" => Some(PropertyType::Name),
            "reference" => Some(PropertyType::Reference),
            "weakreference" => Some(PropertyType::WeakReference),
            "path" => Some(PropertyType::Path),
            _ => None,
        }
    }

    pub fn is_reference_like(&self) -> bool {
        matches!(
            self,
            PropertyType::Reference | PropertyType::WeakReference | PropertyType::Path
        )
    }

    /// Infer a storage type from a JSON scalar when the payload names none.
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Bool(_) => PropertyType::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => PropertyType::Long,
            Value::Number(_) => PropertyType::Double,
            _ => PropertyType::String,
        }
    }
}

/// A single- or multi-valued property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Single(Value),
    Multiple(Vec<Value>),
}

impl PropertyValue {
    pub fn is_multiple(&self) -> bool {
        matches!(self, PropertyValue::Multiple(_))
    }

    /// All scalar values, one for single, in order for multiple.
    pub fn scalars(&self) -> Vec<&Value> {
        match self {
            PropertyValue::Single(v) => vec![v],
            PropertyValue::Multiple(vs) => vs.iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyData {
    pub name: String,
    pub ptype: PropertyType,
    pub value: PropertyValue,
}

/// One property to write: name, optional explicit type, value.
#[derive(Debug, Clone)]
pub struct PropertyWrite {
    pub name: String,
    pub ptype: Option<PropertyType>,
    pub value: PropertyValue,
}

#[derive(Debug, Clone)]
pub struct ChildEntry {
    pub id: String,
    pub name: SiblingName,
}

#[derive(Debug, Clone)]
pub struct NodeData {
    /// Opaque repository-assigned identifier; the empty string for the root.
    pub id: String,
    pub parent_id: Option<String>,
    /// Unescaped item name; empty for the root.
    pub name: String,
    /// 1-based same-name-sibling index.
    pub index: u32,
    /// Absolute repository path; empty for the root.
    pub path: String,
    pub primary_type: String,
    pub mixins: Vec<String>,
    pub properties: Vec<PropertyData>,
    pub children: Vec<ChildEntry>,
    pub versionable: bool,
}

impl NodeData {
    pub fn property(&self, name: &str) -> Option<&PropertyData> {
        self.properties.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct VersionData {
    pub name: String,
    pub created: DateTime<Utc>,
    /// Identifier of the frozen snapshot node.
    pub frozen_id: String,
}

#[derive(Debug, Clone)]
pub struct NodeTypeData {
    pub name: String,
    /// Declared property-definition names, in declaration order.
    pub property_definitions: Vec<String>,
    pub mixin: bool,
}

/// Sort order for type queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOrder {
    Name,
    Path,
}

/// One open repository session, bound to a workspace/locale pair and to a
/// single request. Mutations stay pending until [`Session::save`]; a session
/// closed without saving discards them.
#[async_trait]
pub trait Session: Send + Sync {
    fn workspace(&self) -> &str;
    fn locale(&self) -> &str;

    async fn root(&self) -> RepoResult<NodeData>;
    async fn node_by_id(&self, id: &str) -> RepoResult<NodeData>;
    /// Resolve a slash-separated path; segments may carry `name[index]`
    /// sibling suffixes. The empty path is the root.
    async fn node_by_path(&self, path: &str) -> RepoResult<NodeData>;
    /// Node-type lookup; `None` for types the engine has no definition for.
    async fn node_type(&self, name: &str) -> RepoResult<Option<NodeTypeData>>;

    /// Write one property. Returns the stored property and whether it
    /// replaced an existing one.
    async fn set_property(&self, node_id: &str, write: PropertyWrite)
        -> RepoResult<(PropertyData, bool)>;
    async fn remove_property(&self, node_id: &str, name: &str) -> RepoResult<()>;

    /// Add a mixin capability. Returns true when it was already present.
    async fn add_mixin(&self, node_id: &str, mixin: &str) -> RepoResult<bool>;
    async fn remove_mixin(&self, node_id: &str, mixin: &str) -> RepoResult<()>;

    /// Create a child, or update the same-named child in place. `primary_type`
    /// of `None` means the engine default on create and keep-existing on
    /// update. Returns the resulting node and whether an existing child was
    /// updated.
    async fn create_child(
        &self,
        node_id: &str,
        name: &str,
        primary_type: Option<&str>,
        properties: Vec<PropertyWrite>,
    ) -> RepoResult<(NodeData, bool)>;
    /// Remove a child (and its subtree) by `name` or `name[index]`.
    async fn remove_child(&self, node_id: &str, name: &str) -> RepoResult<()>;

    /// Apply properties and mixins to the node itself.
    async fn apply_node(
        &self,
        node_id: &str,
        properties: Vec<PropertyWrite>,
        mixins: Vec<String>,
    ) -> RepoResult<NodeData>;
    async fn remove_node(&self, node_id: &str) -> RepoResult<()>;
    async fn rename_node(&self, node_id: &str, new_name: &str) -> RepoResult<NodeData>;

    /// Linear version history, oldest first; empty for non-versionable nodes.
    async fn version_history(&self, node_id: &str) -> RepoResult<Vec<VersionData>>;

    async fn query_by_type(
        &self,
        type_name: &str,
        name_contains: Option<&str>,
        order: QueryOrder,
        limit: usize,
        offset: usize,
    ) -> RepoResult<Vec<NodeData>>;

    /// Commit pending mutations.
    async fn save(&self) -> RepoResult<()>;
    /// Release the session, discarding anything unsaved. Idempotent.
    fn close(&self);
    fn is_live(&self) -> bool;
}

#[async_trait]
pub trait Repository: Send + Sync {
    async fn login(&self, workspace: &str, locale: &str) -> RepoResult<Box<dyn Session>>;
}
