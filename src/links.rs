//! Hypermedia link computation.
//!
//! Every representation carries a `_links` map keyed by relation name. All
//! URIs derive from startup configuration plus the request's workspace and
//! locale; nothing is inferred from the incoming request URI.

use crate::config::ApiConfig;
use crate::escape::{escape, escape_indexed};
use crate::repo::{NodeData, NodeTypeData, PropertyData, PropertyType, VersionData};
use serde::Serialize;
use std::collections::BTreeMap;

/// Item name of a property definition inside a node-type definition.
pub const PROPERTY_DEFINITION: &str = "sys:propertyDefinition";

pub const REL_SELF: &str = "self";
pub const REL_PARENT: &str = "parent";
pub const REL_TYPE: &str = "type";
pub const REL_ABSOLUTE: &str = "absolute";
pub const REL_TARGET: &str = "target";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LinkTarget {
    One(Link),
    Many(Vec<Link>),
}

/// Relation -> link map; BTreeMap keeps serialization order stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Links(pub BTreeMap<String, LinkTarget>);

impl Links {
    pub fn insert(&mut self, rel: &str, href: impl Into<String>) {
        self.0
            .insert(rel.to_string(), LinkTarget::One(Link { href: href.into() }));
    }

    pub fn insert_many(&mut self, rel: &str, hrefs: Vec<String>) {
        let links = hrefs.into_iter().map(|href| Link { href }).collect();
        self.0.insert(rel.to_string(), LinkTarget::Many(links));
    }

    pub fn href(&self, rel: &str) -> Option<&str> {
        match self.0.get(rel)? {
            LinkTarget::One(link) => Some(&link.href),
            LinkTarget::Many(_) => None,
        }
    }

    pub fn contains(&self, rel: &str) -> bool {
        self.0.contains_key(rel)
    }
}

/// Per-request URI factory: configured API mount path + workspace + locale.
#[derive(Debug, Clone)]
pub struct UriBuilder {
    api_path: String,
    external_base: Option<String>,
    workspace: String,
    locale: String,
}

impl UriBuilder {
    pub fn new(config: &ApiConfig, workspace: &str, locale: &str) -> Self {
        Self {
            api_path: config.api_path.clone(),
            external_base: config.external_base.clone(),
            workspace: workspace.to_string(),
            locale: locale.to_string(),
        }
    }

    fn scope(&self) -> String {
        format!("{}/{}/{}", self.api_path, self.workspace, self.locale)
    }

    /// Node-collection base URI.
    pub fn nodes(&self) -> String {
        format!("{}/nodes", self.scope())
    }

    /// A node's canonical URI. The root's identifier is empty, so its URI is
    /// the collection base itself.
    pub fn node(&self, id: &str) -> String {
        if id.is_empty() {
            self.nodes()
        } else {
            format!("{}/{}", self.nodes(), id)
        }
    }

    pub fn by_path_base(&self) -> String {
        format!("{}/byPath", self.scope())
    }

    /// A node's by-path URI; repository path segments are escaped.
    pub fn by_path(&self, path: &str) -> String {
        let segments: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                let (name, index) = split_indexed(s);
                escape_indexed(name, index)
            })
            .collect();
        if segments.is_empty() {
            self.by_path_base()
        } else {
            format!("{}/{}", self.by_path_base(), segments.join("/"))
        }
    }

    /// Node-type catalog base URI.
    pub fn types(&self) -> String {
        format!("{}/types", self.scope())
    }

    pub fn node_type(&self, name: &str) -> String {
        format!("{}/{}", self.types(), escape(name))
    }

    pub fn absolute(&self, href: &str) -> Option<String> {
        self.external_base.as_ref().map(|base| format!("{base}{href}"))
    }
}

/// Split the repository's `name[index]` form.
fn split_indexed(segment: &str) -> (&str, u32) {
    if let Some(open) = segment.rfind('[') {
        if let Some(stripped) = segment.strip_suffix(']') {
            if let Ok(index) = stripped[open + 1..].parse::<u32>() {
                return (&segment[..open], index);
            }
        }
    }
    (segment, 1)
}

/// Link set of a node: `self`, `parent`, `type`, the four container links,
/// and `absolute` when an external base is configured. A root node's parent
/// is itself.
pub fn node_links(uris: &UriBuilder, node: &NodeData) -> Links {
    let self_uri = uris.node(&node.id);
    let mut links = Links::default();
    links.insert(REL_PARENT, uris.node(node.parent_id.as_deref().unwrap_or(&node.id)));
    links.insert(REL_TYPE, uris.node_type(&node.primary_type));
    if let Some(absolute) = uris.absolute(&self_uri) {
        links.insert(REL_ABSOLUTE, absolute);
    }
    for marker in crate::accessor::SubElementKind::RESERVED {
        links.insert(marker, format!("{self_uri}/{marker}"));
    }
    links.insert(REL_SELF, self_uri);
    links
}

/// Link set of a sub-element container (`properties`, `children`, ...).
pub fn container_links(uris: &UriBuilder, node: &NodeData, marker: &str) -> Links {
    let node_uri = uris.node(&node.id);
    let self_uri = format!("{node_uri}/{marker}");
    let mut links = Links::default();
    links.insert(REL_PARENT, node_uri);
    if let Some(absolute) = uris.absolute(&self_uri) {
        links.insert(REL_ABSOLUTE, absolute);
    }
    links.insert(REL_SELF, self_uri);
    links
}

/// Link set of a single property.
///
/// The `type` link resolves through the declaring node type's ordered
/// property-definition list: a type with at most one definition needs no
/// disambiguating index, otherwise the 1-based position of the matching
/// definition is appended as a sibling index before escaping. Reference-like
/// values get a `target` link per value.
pub fn property_links(
    uris: &UriBuilder,
    node: &NodeData,
    declaring: Option<&NodeTypeData>,
    prop: &PropertyData,
) -> Links {
    let node_uri = uris.node(&node.id);
    let self_uri = format!("{node_uri}/properties/{}", escape(&prop.name));
    let mut links = Links::default();
    links.insert(REL_PARENT, node_uri);

    let definition_index = declaring
        .filter(|t| t.property_definitions.len() > 1)
        .and_then(|t| {
            t.property_definitions
                .iter()
                .position(|d| *d == prop.name)
                .map(|pos| pos as u32 + 1)
        })
        .unwrap_or(1);
    let type_name = declaring.map(|t| t.name.as_str()).unwrap_or(&node.primary_type);
    links.insert(
        REL_TYPE,
        format!(
            "{}/{}",
            uris.node_type(type_name),
            escape_indexed(PROPERTY_DEFINITION, definition_index)
        ),
    );

    if prop.ptype.is_reference_like() {
        let targets: Vec<String> = prop
            .value
            .scalars()
            .iter()
            .filter_map(|v| v.as_str())
            .map(|v| match prop.ptype {
                PropertyType::Path => uris.by_path(v),
                _ => uris.node(v),
            })
            .collect();
        match (prop.value.is_multiple(), targets.len()) {
            (false, 1) => links.insert(REL_TARGET, targets.into_iter().next().unwrap_or_default()),
            (_, 0) => {}
            _ => links.insert_many(REL_TARGET, targets),
        }
    }

    if let Some(absolute) = uris.absolute(&self_uri) {
        links.insert(REL_ABSOLUTE, absolute);
    }
    links.insert(REL_SELF, self_uri);
    links
}

/// Link set of a mixin capability; `type` points at the mixin's own
/// node-type definition.
pub fn mixin_links(uris: &UriBuilder, node: &NodeData, mixin: &str) -> Links {
    let node_uri = uris.node(&node.id);
    let self_uri = format!("{node_uri}/mixins/{}", escape(mixin));
    let mut links = Links::default();
    links.insert(REL_PARENT, node_uri);
    links.insert(REL_TYPE, uris.node_type(mixin));
    if let Some(absolute) = uris.absolute(&self_uri) {
        links.insert(REL_ABSOLUTE, absolute);
    }
    links.insert(REL_SELF, self_uri);
    links
}

/// Link set of a version. `neighbors` carries the linear predecessor and
/// successor; history-container listings pass `None` and omit both.
pub fn version_links(
    uris: &UriBuilder,
    node: &NodeData,
    version: &VersionData,
    neighbors: Option<(Option<&VersionData>, Option<&VersionData>)>,
) -> Links {
    let node_uri = uris.node(&node.id);
    let versions_uri = format!("{node_uri}/versions");
    let self_uri = format!("{versions_uri}/{}", escape(&version.name));
    let mut links = Links::default();
    links.insert(REL_PARENT, node_uri);
    links.insert("nodeAtVersion", uris.node(&version.frozen_id));
    if let Some((previous, next)) = neighbors {
        if let Some(previous) = previous {
            links.insert("previous", format!("{versions_uri}/{}", escape(&previous.name)));
        }
        if let Some(next) = next {
            links.insert("next", format!("{versions_uri}/{}", escape(&next.name)));
        }
    }
    if let Some(absolute) = uris.absolute(&self_uri) {
        links.insert(REL_ABSOLUTE, absolute);
    }
    links.insert(REL_SELF, self_uri);
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::PropertyValue;
    use serde_json::json;

    fn uris() -> UriBuilder {
        UriBuilder::new(&ApiConfig::default(), "default", "en")
    }

    fn node(id: &str, parent: Option<&str>) -> NodeData {
        NodeData {
            id: id.to_string(),
            parent_id: parent.map(String::from),
            name: "article".to_string(),
            index: 1,
            path: "/content/article".to_string(),
            primary_type: "doc:article".to_string(),
            mixins: vec![],
            properties: vec![],
            children: vec![],
            versionable: false,
        }
    }

    #[test]
    fn node_links_are_complete() {
        let links = node_links(&uris(), &node("n1", Some("p1")));
        for rel in ["self", "parent", "type", "properties", "children", "mixins", "versions"] {
            assert!(links.contains(rel), "missing link '{rel}'");
        }
        assert_eq!(links.href("self"), Some("/api/default/en/nodes/n1"));
        assert_eq!(links.href("parent"), Some("/api/default/en/nodes/p1"));
        assert_eq!(links.href("type"), Some("/api/default/en/types/doc__article"));
        assert_eq!(
            links.href("properties"),
            Some("/api/default/en/nodes/n1/properties")
        );
    }

    #[test]
    fn root_node_is_its_own_parent_at_the_collection_base() {
        let mut root = node("", None);
        root.name = String::new();
        root.path = String::new();
        let links = node_links(&uris(), &root);
        assert_eq!(links.href("self"), Some("/api/default/en/nodes"));
        assert_eq!(links.href("parent"), Some("/api/default/en/nodes"));
    }

    #[test]
    fn absolute_link_requires_external_base() {
        let links = node_links(&uris(), &node("n1", None));
        assert!(!links.contains("absolute"));

        let config = ApiConfig {
            external_base: Some("https://cms.example.org".to_string()),
            ..ApiConfig::default()
        };
        let uris = UriBuilder::new(&config, "default", "en");
        let links = node_links(&uris, &node("n1", None));
        assert_eq!(
            links.href("absolute"),
            Some("https://cms.example.org/api/default/en/nodes/n1")
        );
    }

    #[test]
    fn property_definition_index_disambiguates() {
        let declaring = NodeTypeData {
            name: "doc:article".to_string(),
            property_definitions: vec!["a".to_string(), "b".to_string()],
            mixin: false,
        };
        let n = node("n1", None);
        let prop = |name: &str| PropertyData {
            name: name.to_string(),
            ptype: crate::repo::PropertyType::String,
            value: PropertyValue::Single(json!("v")),
        };

        let links_a = property_links(&uris(), &n, Some(&declaring), &prop("a"));
        assert_eq!(
            links_a.href("type"),
            Some("/api/default/en/types/doc__article/sys__propertyDefinition")
        );
        let links_b = property_links(&uris(), &n, Some(&declaring), &prop("b"));
        assert_eq!(
            links_b.href("type"),
            Some("/api/default/en/types/doc__article/sys__propertyDefinition--2")
        );
    }

    #[test]
    fn single_definition_type_needs_no_index() {
        let declaring = NodeTypeData {
            name: "doc:article".to_string(),
            property_definitions: vec!["title".to_string()],
            mixin: false,
        };
        let n = node("n1", None);
        let prop = PropertyData {
            name: "title".to_string(),
            ptype: crate::repo::PropertyType::String,
            value: PropertyValue::Single(json!("v")),
        };
        let links = property_links(&uris(), &n, Some(&declaring), &prop);
        assert_eq!(
            links.href("type"),
            Some("/api/default/en/types/doc__article/sys__propertyDefinition")
        );
    }

    #[test]
    fn reference_property_targets_the_node_uri() {
        let n = node("n1", None);
        let prop = PropertyData {
            name: "related".to_string(),
            ptype: crate::repo::PropertyType::Reference,
            value: PropertyValue::Single(json!("target-id")),
        };
        let links = property_links(&uris(), &n, None, &prop);
        assert_eq!(links.href("target"), Some("/api/default/en/nodes/target-id"));
    }

    #[test]
    fn multi_valued_reference_targets_keep_order() {
        let n = node("n1", None);
        let prop = PropertyData {
            name: "related".to_string(),
            ptype: crate::repo::PropertyType::WeakReference,
            value: PropertyValue::Multiple(vec![json!("id-b"), json!("id-a")]),
        };
        let links = property_links(&uris(), &n, None, &prop);
        match links.0.get("target") {
            Some(LinkTarget::Many(targets)) => {
                assert_eq!(
                    targets.iter().map(|l| l.href.as_str()).collect::<Vec<_>>(),
                    ["/api/default/en/nodes/id-b", "/api/default/en/nodes/id-a"]
                );
            }
            other => panic!("expected target array, got {other:?}"),
        }
    }

    #[test]
    fn empty_multi_valued_reference_omits_target() {
        let n = node("n1", None);
        let prop = PropertyData {
            name: "related".to_string(),
            ptype: crate::repo::PropertyType::Reference,
            value: PropertyValue::Multiple(vec![]),
        };
        let links = property_links(&uris(), &n, None, &prop);
        assert!(!links.contains("target"));
    }

    #[test]
    fn path_property_targets_the_by_path_uri() {
        let n = node("n1", None);
        let prop = PropertyData {
            name: "source".to_string(),
            ptype: crate::repo::PropertyType::Path,
            value: PropertyValue::Single(json!("/content/article[2]")),
        };
        let links = property_links(&uris(), &n, None, &prop);
        assert_eq!(
            links.href("target"),
            Some("/api/default/en/byPath/content/article--2")
        );
    }

    #[test]
    fn version_neighbor_links() {
        let n = node("n1", None);
        let v = |name: &str| VersionData {
            name: name.to_string(),
            created: chrono::Utc::now(),
            frozen_id: format!("frozen-{name}"),
        };
        let (first, second, third) = (v("1.0"), v("1.1"), v("1.2"));
        let links = version_links(&uris(), &n, &second, Some((Some(&first), Some(&third))));
        assert_eq!(
            links.href("previous"),
            Some("/api/default/en/nodes/n1/versions/1.0")
        );
        assert_eq!(
            links.href("next"),
            Some("/api/default/en/nodes/n1/versions/1.2")
        );
        assert_eq!(links.href("nodeAtVersion"), Some("/api/default/en/nodes/frozen-1.1"));

        let listed = version_links(&uris(), &n, &second, None);
        assert!(!listed.contains("previous"));
        assert!(!listed.contains("next"));
    }
}
