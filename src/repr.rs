//! JSON representations of repository items and the payloads that mutate them.
//!
//! Representations are built fresh per request from live repository state and
//! discarded after serialization. Embedding depth is an explicit budget: 0
//! means links only, each increment embeds one more level of container
//! content.

use crate::error::ApiError;
use crate::links::{self, Links};
use crate::repo::{
    NodeData, PropertyData, PropertyType, PropertyValue, PropertyWrite, VersionData,
};
use crate::session::RequestContext;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

pub const PROPERTY_CONTAINER_TYPE: &str = "sys:propertyContainer";
pub const CHILD_CONTAINER_TYPE: &str = "sys:childContainer";
pub const MIXIN_CONTAINER_TYPE: &str = "sys:mixinContainer";
pub const VERSION_CONTAINER_TYPE: &str = "sys:versionContainer";
pub const VERSION_TYPE: &str = "sys:version";

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Representation {
    Node(NodeRepresentation),
    Property(PropertyRepresentation),
    Properties(PropertiesRepresentation),
    Children(ChildrenRepresentation),
    Mixin(MixinRepresentation),
    Mixins(MixinsRepresentation),
    Version(VersionRepresentation),
    Versions(VersionsRepresentation),
}

impl Representation {
    pub fn links(&self) -> &Links {
        match self {
            Representation::Node(r) => &r.links,
            Representation::Property(r) => &r.links,
            Representation::Properties(r) => &r.links,
            Representation::Children(r) => &r.links,
            Representation::Mixin(r) => &r.links,
            Representation::Mixins(r) => &r.links,
            Representation::Version(r) => &r.links,
            Representation::Versions(r) => &r.links,
        }
    }

    pub fn self_href(&self) -> Option<&str> {
        self.links().href(links::REL_SELF)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeRepresentation {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, PropertyRepresentation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<BTreeMap<String, NodeRepresentation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mixins: Option<BTreeMap<String, MixinRepresentation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub versions: Option<BTreeMap<String, VersionRepresentation>>,
    #[serde(rename = "_links")]
    pub links: Links,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyRepresentation {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(rename = "multiValued")]
    pub multi_valued: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
    #[serde(rename = "_links")]
    pub links: Links,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertiesRepresentation {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub properties: BTreeMap<String, PropertyRepresentation>,
    #[serde(rename = "_links")]
    pub links: Links,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChildrenRepresentation {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub children: BTreeMap<String, NodeRepresentation>,
    #[serde(rename = "_links")]
    pub links: Links,
}

#[derive(Debug, Clone, Serialize)]
pub struct MixinRepresentation {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(rename = "_links")]
    pub links: Links,
}

#[derive(Debug, Clone, Serialize)]
pub struct MixinsRepresentation {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub mixins: BTreeMap<String, MixinRepresentation>,
    #[serde(rename = "_links")]
    pub links: Links,
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionRepresentation {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub created: DateTime<Utc>,
    #[serde(rename = "_links")]
    pub links: Links,
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionsRepresentation {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub versions: BTreeMap<String, VersionRepresentation>,
    #[serde(rename = "_links")]
    pub links: Links,
}

/// Build a node representation, embedding `depth` levels of container
/// content. Boxed because child embedding recurses through it.
pub fn node_repr<'a>(
    ctx: &'a RequestContext<'a>,
    node: NodeData,
    depth: u32,
) -> Pin<Box<dyn Future<Output = Result<NodeRepresentation, ApiError>> + Send + 'a>> {
    Box::pin(async move {
        let links = links::node_links(ctx.uris, &node);
        let mut repr = NodeRepresentation {
            name: node.name.clone(),
            type_name: node.primary_type.clone(),
            id: node.id.clone(),
            properties: None,
            children: None,
            mixins: None,
            versions: None,
            links,
        };
        if depth == 0 {
            return Ok(repr);
        }

        repr.properties = Some(property_entries(ctx, &node).await?);

        let mut children = BTreeMap::new();
        for child in &node.children {
            let child_node = ctx.session.node_by_id(&child.id).await?;
            children.insert(
                child.name.segment(),
                node_repr(ctx, child_node, depth - 1).await?,
            );
        }
        repr.children = Some(children);

        let mut mixins = BTreeMap::new();
        for mixin in &node.mixins {
            mixins.insert(
                crate::escape::escape(mixin),
                mixin_repr(ctx, &node, mixin),
            );
        }
        repr.mixins = Some(mixins);

        if node.versionable {
            repr.versions = Some(version_entries(ctx, &node).await?);
        }
        Ok(repr)
    })
}

pub async fn property_repr(
    ctx: &RequestContext<'_>,
    node: &NodeData,
    prop: &PropertyData,
) -> Result<PropertyRepresentation, ApiError> {
    let declaring = ctx.session.node_type(&node.primary_type).await?;
    let links = links::property_links(ctx.uris, node, declaring.as_ref(), prop);
    let (value, values) = match &prop.value {
        PropertyValue::Single(v) => (Some(v.clone()), None),
        PropertyValue::Multiple(vs) => (None, Some(vs.clone())),
    };
    Ok(PropertyRepresentation {
        name: prop.name.clone(),
        type_name: prop.ptype.as_str().to_string(),
        multi_valued: prop.value.is_multiple(),
        value,
        values,
        links,
    })
}

async fn property_entries(
    ctx: &RequestContext<'_>,
    node: &NodeData,
) -> Result<BTreeMap<String, PropertyRepresentation>, ApiError> {
    let mut entries = BTreeMap::new();
    for prop in &node.properties {
        entries.insert(
            crate::escape::escape(&prop.name),
            property_repr(ctx, node, prop).await?,
        );
    }
    Ok(entries)
}

pub async fn properties_repr(
    ctx: &RequestContext<'_>,
    node: &NodeData,
) -> Result<PropertiesRepresentation, ApiError> {
    Ok(PropertiesRepresentation {
        name: "properties".to_string(),
        type_name: PROPERTY_CONTAINER_TYPE.to_string(),
        properties: property_entries(ctx, node).await?,
        links: links::container_links(ctx.uris, node, "properties"),
    })
}

/// Child-container representation; entries embed `entry_depth` further levels.
pub async fn children_repr(
    ctx: &RequestContext<'_>,
    node: &NodeData,
    entry_depth: u32,
) -> Result<ChildrenRepresentation, ApiError> {
    let mut children = BTreeMap::new();
    for child in &node.children {
        let child_node = ctx.session.node_by_id(&child.id).await?;
        children.insert(
            child.name.segment(),
            node_repr(ctx, child_node, entry_depth).await?,
        );
    }
    Ok(ChildrenRepresentation {
        name: "children".to_string(),
        type_name: CHILD_CONTAINER_TYPE.to_string(),
        children,
        links: links::container_links(ctx.uris, node, "children"),
    })
}

pub fn mixin_repr(ctx: &RequestContext<'_>, node: &NodeData, mixin: &str) -> MixinRepresentation {
    MixinRepresentation {
        name: mixin.to_string(),
        type_name: mixin.to_string(),
        links: links::mixin_links(ctx.uris, node, mixin),
    }
}

pub fn mixins_repr(ctx: &RequestContext<'_>, node: &NodeData) -> MixinsRepresentation {
    let mixins = node
        .mixins
        .iter()
        .map(|m| (crate::escape::escape(m), mixin_repr(ctx, node, m)))
        .collect();
    MixinsRepresentation {
        name: "mixins".to_string(),
        type_name: MIXIN_CONTAINER_TYPE.to_string(),
        mixins,
        links: links::container_links(ctx.uris, node, "mixins"),
    }
}

pub fn version_repr(
    ctx: &RequestContext<'_>,
    node: &NodeData,
    version: &VersionData,
    neighbors: Option<(Option<&VersionData>, Option<&VersionData>)>,
) -> VersionRepresentation {
    VersionRepresentation {
        name: version.name.clone(),
        type_name: VERSION_TYPE.to_string(),
        created: version.created,
        links: links::version_links(ctx.uris, node, version, neighbors),
    }
}

async fn version_entries(
    ctx: &RequestContext<'_>,
    node: &NodeData,
) -> Result<BTreeMap<String, VersionRepresentation>, ApiError> {
    let history = ctx.session.version_history(&node.id).await?;
    Ok(history
        .iter()
        .map(|v| {
            (
                crate::escape::escape(&v.name),
                version_repr(ctx, node, v, None),
            )
        })
        .collect())
}

pub async fn versions_repr(
    ctx: &RequestContext<'_>,
    node: &NodeData,
) -> Result<VersionsRepresentation, ApiError> {
    Ok(VersionsRepresentation {
        name: "versions".to_string(),
        type_name: VERSION_CONTAINER_TYPE.to_string(),
        versions: version_entries(ctx, node).await?,
        links: links::container_links(ctx.uris, node, "versions"),
    })
}

/// Mutation payload for a single property: `{type?, value | values}`, or a
/// bare JSON scalar/array shorthand.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertyPayload {
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    pub value: Option<Value>,
    pub values: Option<Vec<Value>>,
}

impl PropertyPayload {
    pub fn from_json(payload: Value) -> Result<Self, ApiError> {
        match payload {
            Value::Object(ref map)
                if map.contains_key("value")
                    || map.contains_key("values")
                    || map.contains_key("type") =>
            {
                serde_json::from_value(payload)
                    .map_err(|e| ApiError::validation(format!("invalid property payload: {e}")))
            }
            Value::Array(items) => Ok(Self {
                type_name: None,
                value: None,
                values: Some(items),
            }),
            other => Ok(Self {
                type_name: None,
                value: Some(other),
                values: None,
            }),
        }
    }

    pub fn into_write(self, name: &str) -> Result<PropertyWrite, ApiError> {
        let ptype = self
            .type_name
            .as_deref()
            .map(|t| {
                PropertyType::parse(t)
                    .ok_or_else(|| ApiError::validation(format!("unknown property type '{t}'")))
            })
            .transpose()?;
        let value = match (self.value, self.values) {
            (Some(_), Some(_)) => {
                return Err(ApiError::validation(
                    "'value' and 'values' are mutually exclusive",
                ))
            }
            (Some(v), None) => PropertyValue::Single(v),
            (None, Some(vs)) => PropertyValue::Multiple(vs),
            (None, None) => return Err(ApiError::validation("missing property value")),
        };
        Ok(PropertyWrite {
            name: name.to_string(),
            ptype,
            value,
        })
    }
}

/// Mutation payload for a node or child: optional primary type, properties
/// keyed by unescaped name, mixins to add.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodePayload {
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
    #[serde(default)]
    pub mixins: Vec<String>,
}

impl NodePayload {
    pub fn from_json(payload: Value) -> Result<Self, ApiError> {
        serde_json::from_value(payload)
            .map_err(|e| ApiError::validation(format!("invalid node payload: {e}")))
    }

    pub fn property_writes(&self) -> Result<Vec<PropertyWrite>, ApiError> {
        self.properties
            .iter()
            .map(|(name, raw)| PropertyPayload::from_json(raw.clone())?.into_write(name))
            .collect()
    }
}

/// Mutation payload for adding a mixin; properties it contributes may be set
/// in the same request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MixinPayload {
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl MixinPayload {
    pub fn from_json(payload: Value) -> Result<Self, ApiError> {
        serde_json::from_value(payload)
            .map_err(|e| ApiError::validation(format!("invalid mixin payload: {e}")))
    }

    pub fn property_writes(&self) -> Result<Vec<PropertyWrite>, ApiError> {
        self.properties
            .iter()
            .map(|(name, raw)| PropertyPayload::from_json(raw.clone())?.into_write(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_scalar_is_a_value_shorthand() {
        let payload = PropertyPayload::from_json(json!("hello")).unwrap();
        let write = payload.into_write("title").unwrap();
        assert_eq!(write.value, PropertyValue::Single(json!("hello")));
        assert!(write.ptype.is_none());
    }

    #[test]
    fn bare_array_is_a_values_shorthand() {
        let payload = PropertyPayload::from_json(json!(["a", "b"])).unwrap();
        let write = payload.into_write("tags").unwrap();
        assert_eq!(write.value, PropertyValue::Multiple(vec![json!("a"), json!("b")]));
    }

    #[test]
    fn typed_payload_parses_the_type() {
        let payload =
            PropertyPayload::from_json(json!({"type": "reference", "value": "some-id"})).unwrap();
        let write = payload.into_write("related").unwrap();
        assert_eq!(write.ptype, Some(PropertyType::Reference));
    }

    #[test]
    fn unknown_type_is_a_validation_error() {
        let payload = PropertyPayload::from_json(json!({"type": "blob", "value": 1})).unwrap();
        assert!(payload.into_write("x").is_err());
    }

    #[test]
    fn value_and_values_are_exclusive() {
        let payload =
            PropertyPayload::from_json(json!({"value": 1, "values": [1, 2]})).unwrap();
        assert!(payload.into_write("x").is_err());
    }

    #[test]
    fn node_payload_collects_property_writes() {
        let payload = NodePayload::from_json(json!({
            "type": "doc:article",
            "properties": {
                "title": "hello",
                "tags": {"values": ["a", "b"]}
            },
            "mixins": ["sys:versionable"]
        }))
        .unwrap();
        assert_eq!(payload.type_name.as_deref(), Some("doc:article"));
        let writes = payload.property_writes().unwrap();
        assert_eq!(writes.len(), 2);
        assert_eq!(payload.mixins, vec!["sys:versionable".to_string()]);
    }
}
