//! Accessor for the `mixins` facet.

use super::{CreateOrUpdate, SubElementAccessor};
use crate::error::ApiError;
use crate::repo::NodeData;
use crate::repr::{self, MixinPayload, Representation};
use crate::service::validate_item_name;
use crate::session::RequestContext;
use async_trait::async_trait;
use serde_json::Value;

pub struct MixinsAccessor;

#[async_trait]
impl SubElementAccessor for MixinsAccessor {
    async fn container(
        &self,
        ctx: &RequestContext<'_>,
        node: &NodeData,
    ) -> Result<Representation, ApiError> {
        Ok(Representation::Mixins(repr::mixins_repr(ctx, node)))
    }

    async fn entry(
        &self,
        ctx: &RequestContext<'_>,
        node: &NodeData,
        name: &str,
    ) -> Result<Representation, ApiError> {
        if !node.mixins.iter().any(|m| m == name) {
            return Err(ApiError::not_found(format!("mixin '{name}'")));
        }
        Ok(Representation::Mixin(repr::mixin_repr(ctx, node, name)))
    }

    async fn create_or_update(
        &self,
        ctx: &RequestContext<'_>,
        node: &NodeData,
        name: &str,
        payload: Option<Value>,
    ) -> Result<CreateOrUpdate, ApiError> {
        validate_item_name(name)?;
        let payload = match payload {
            Some(value) => MixinPayload::from_json(value)?,
            None => MixinPayload::default(),
        };
        let existed = ctx.session.add_mixin(&node.id, name).await?;
        let writes = payload.property_writes()?;
        let node = if writes.is_empty() {
            ctx.session.node_by_id(&node.id).await?
        } else {
            ctx.session.apply_node(&node.id, writes, Vec::new()).await?
        };
        Ok(CreateOrUpdate {
            updated: existed,
            repr: Representation::Mixin(repr::mixin_repr(ctx, &node, name)),
        })
    }

    async fn delete(
        &self,
        ctx: &RequestContext<'_>,
        node: &NodeData,
        name: &str,
    ) -> Result<(), ApiError> {
        ctx.session
            .remove_mixin(&node.id, name)
            .await
            .map_err(ApiError::from)
    }
}
