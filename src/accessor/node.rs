//! Accessor for the identity kind: the node itself.

use super::{CreateOrUpdate, SubElementAccessor};
use crate::error::ApiError;
use crate::repo::NodeData;
use crate::repr::{self, NodePayload, Representation};
use crate::session::RequestContext;
use async_trait::async_trait;
use serde_json::Value;

pub struct NodeAccessor;

#[async_trait]
impl SubElementAccessor for NodeAccessor {
    /// There is no container for "the node itself"; a read with an empty name
    /// is answered with the node's own representation by the dispatch layer.
    async fn container(
        &self,
        _ctx: &RequestContext<'_>,
        _node: &NodeData,
    ) -> Result<Representation, ApiError> {
        Err(ApiError::unsupported(
            "the identity kind has no container representation",
        ))
    }

    async fn entry(
        &self,
        ctx: &RequestContext<'_>,
        node: &NodeData,
        _name: &str,
    ) -> Result<Representation, ApiError> {
        Ok(Representation::Node(
            repr::node_repr(ctx, node.clone(), ctx.depth).await?,
        ))
    }

    /// The node exists by construction, so this is always an update.
    async fn create_or_update(
        &self,
        ctx: &RequestContext<'_>,
        node: &NodeData,
        _name: &str,
        payload: Option<Value>,
    ) -> Result<CreateOrUpdate, ApiError> {
        let payload = payload.ok_or_else(|| ApiError::validation("missing request body"))?;
        let payload = NodePayload::from_json(payload)?;
        let writes = payload.property_writes()?;
        let updated = ctx
            .session
            .apply_node(&node.id, writes, payload.mixins.clone())
            .await?;
        let repr = repr::node_repr(ctx, updated, ctx.depth).await?;
        Ok(CreateOrUpdate {
            updated: true,
            repr: Representation::Node(repr),
        })
    }

    async fn delete(
        &self,
        ctx: &RequestContext<'_>,
        node: &NodeData,
        _name: &str,
    ) -> Result<(), ApiError> {
        ctx.session
            .remove_node(&node.id)
            .await
            .map_err(ApiError::from)
    }
}
