//! Accessor for the `children` facet.

use super::{CreateOrUpdate, SubElementAccessor};
use crate::error::ApiError;
use crate::repo::{NodeData, UNSTRUCTURED_TYPE};
use crate::repr::{self, NodePayload, Representation};
use crate::service::validate_item_name;
use crate::session::RequestContext;
use async_trait::async_trait;
use serde_json::Value;

/// Primary type assigned to children created without an explicit one.
pub const DEFAULT_CHILD_TYPE: &str = UNSTRUCTURED_TYPE;

pub struct ChildrenAccessor;

/// Child names arrive unescaped and may carry a `name[index]` sibling suffix;
/// resolution goes through the node's own path.
fn child_path(node: &NodeData, name: &str) -> String {
    format!("{}/{}", node.path, name)
}

#[async_trait]
impl SubElementAccessor for ChildrenAccessor {
    async fn container(
        &self,
        ctx: &RequestContext<'_>,
        node: &NodeData,
    ) -> Result<Representation, ApiError> {
        Ok(Representation::Children(
            repr::children_repr(ctx, node, ctx.depth).await?,
        ))
    }

    async fn entry(
        &self,
        ctx: &RequestContext<'_>,
        node: &NodeData,
        name: &str,
    ) -> Result<Representation, ApiError> {
        let child = ctx.session.node_by_path(&child_path(node, name)).await?;
        Ok(Representation::Node(
            repr::node_repr(ctx, child, ctx.depth).await?,
        ))
    }

    async fn create_or_update(
        &self,
        ctx: &RequestContext<'_>,
        node: &NodeData,
        name: &str,
        payload: Option<Value>,
    ) -> Result<CreateOrUpdate, ApiError> {
        validate_item_name(name.split('[').next().unwrap_or(name))?;
        let payload = match payload {
            Some(value) => NodePayload::from_json(value)?,
            None => NodePayload::default(),
        };
        let writes = payload.property_writes()?;
        let (child, existed) = ctx
            .session
            .create_child(&node.id, name, payload.type_name.as_deref(), writes)
            .await?;
        let repr = repr::node_repr(ctx, child, 0).await?;
        Ok(CreateOrUpdate {
            updated: existed,
            repr: Representation::Node(repr),
        })
    }

    async fn delete(
        &self,
        ctx: &RequestContext<'_>,
        node: &NodeData,
        name: &str,
    ) -> Result<(), ApiError> {
        ctx.session
            .remove_child(&node.id, name)
            .await
            .map_err(ApiError::from)
    }
}
