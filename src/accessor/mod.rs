//! Sub-element accessors: one per addressable facet of a node.
//!
//! The kind set is closed, so lookup is a direct match over the enum rather
//! than any open-ended registry.

mod children;
mod mixins;
mod node;
mod properties;
mod versions;

pub use children::{ChildrenAccessor, DEFAULT_CHILD_TYPE};
pub use mixins::MixinsAccessor;
pub use node::NodeAccessor;
pub use properties::PropertiesAccessor;
pub use versions::VersionsAccessor;

use crate::error::ApiError;
use crate::repo::NodeData;
use crate::repr::Representation;
use crate::session::RequestContext;
use async_trait::async_trait;
use serde_json::Value;

/// The addressable facets of a node. `Node` is the identity kind, selected by
/// the empty marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubElementKind {
    Node,
    Properties,
    Children,
    Mixins,
    Versions,
}

impl SubElementKind {
    /// The four reserved markers, in the order they appear in node links.
    pub const RESERVED: [&'static str; 4] = ["properties", "children", "mixins", "versions"];

    pub fn is_reserved(segment: &str) -> bool {
        Self::RESERVED.iter().any(|m| *m == segment)
    }

    /// Total over recognized markers; anything else is `None`, which the
    /// dispatch layer turns into a request-level not-found.
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "" => Some(SubElementKind::Node),
            "properties" => Some(SubElementKind::Properties),
            "children" => Some(SubElementKind::Children),
            "mixins" => Some(SubElementKind::Mixins),
            "versions" => Some(SubElementKind::Versions),
            _ => None,
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            SubElementKind::Node => "",
            SubElementKind::Properties => "properties",
            SubElementKind::Children => "children",
            SubElementKind::Mixins => "mixins",
            SubElementKind::Versions => "versions",
        }
    }
}

/// Result of a create-or-update: whether a pre-existing entry was updated,
/// and the resulting representation.
#[derive(Debug)]
pub struct CreateOrUpdate {
    pub updated: bool,
    pub repr: Representation,
}

/// The four operations every sub-element kind exposes. Read-only kinds signal
/// unsupported-operation from their mutation methods instead of no-opping.
#[async_trait]
pub trait SubElementAccessor: Send + Sync {
    /// Representation of the whole container.
    async fn container(
        &self,
        ctx: &RequestContext<'_>,
        node: &NodeData,
    ) -> Result<Representation, ApiError>;

    /// One named entry; callers only pass non-empty names.
    async fn entry(
        &self,
        ctx: &RequestContext<'_>,
        node: &NodeData,
        name: &str,
    ) -> Result<Representation, ApiError>;

    /// Create the named entry, or update it in place when it exists.
    async fn create_or_update(
        &self,
        ctx: &RequestContext<'_>,
        node: &NodeData,
        name: &str,
        payload: Option<Value>,
    ) -> Result<CreateOrUpdate, ApiError>;

    async fn delete(
        &self,
        ctx: &RequestContext<'_>,
        node: &NodeData,
        name: &str,
    ) -> Result<(), ApiError>;
}

/// The accessor registered for a kind. Exactly one per kind.
pub fn accessor_for(kind: SubElementKind) -> &'static dyn SubElementAccessor {
    match kind {
        SubElementKind::Node => &NodeAccessor,
        SubElementKind::Properties => &PropertiesAccessor,
        SubElementKind::Children => &ChildrenAccessor,
        SubElementKind::Mixins => &MixinsAccessor,
        SubElementKind::Versions => &VersionsAccessor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_reserved_marker_maps_to_exactly_one_kind() {
        let kinds: Vec<SubElementKind> = SubElementKind::RESERVED
            .iter()
            .map(|m| SubElementKind::from_segment(m).expect("reserved marker must resolve"))
            .collect();
        for (i, a) in kinds.iter().enumerate() {
            for b in &kinds[i + 1..] {
                assert_ne!(a, b);
            }
            assert_ne!(*a, SubElementKind::Node);
        }
    }

    #[test]
    fn the_empty_marker_is_the_identity_kind() {
        assert_eq!(SubElementKind::from_segment(""), Some(SubElementKind::Node));
    }

    #[test]
    fn unrecognized_markers_resolve_to_none() {
        for segment in ["property", "Properties", "nodes", "version", "x"] {
            assert_eq!(SubElementKind::from_segment(segment), None);
        }
    }

    #[test]
    fn markers_round_trip_through_the_enum() {
        for marker in SubElementKind::RESERVED {
            let kind = SubElementKind::from_segment(marker).unwrap();
            assert_eq!(kind.marker(), marker);
        }
    }
}
