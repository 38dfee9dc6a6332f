//! Accessor for the `properties` facet.

use super::{CreateOrUpdate, SubElementAccessor};
use crate::error::ApiError;
use crate::repo::NodeData;
use crate::repr::{self, PropertyPayload, Representation};
use crate::service::validate_item_name;
use crate::session::RequestContext;
use async_trait::async_trait;
use serde_json::Value;

pub struct PropertiesAccessor;

#[async_trait]
impl SubElementAccessor for PropertiesAccessor {
    async fn container(
        &self,
        ctx: &RequestContext<'_>,
        node: &NodeData,
    ) -> Result<Representation, ApiError> {
        Ok(Representation::Properties(
            repr::properties_repr(ctx, node).await?,
        ))
    }

    async fn entry(
        &self,
        ctx: &RequestContext<'_>,
        node: &NodeData,
        name: &str,
    ) -> Result<Representation, ApiError> {
        let prop = node
            .property(name)
            .ok_or_else(|| ApiError::not_found(format!("property '{name}'")))?;
        Ok(Representation::Property(
            repr::property_repr(ctx, node, prop).await?,
        ))
    }

    async fn create_or_update(
        &self,
        ctx: &RequestContext<'_>,
        node: &NodeData,
        name: &str,
        payload: Option<Value>,
    ) -> Result<CreateOrUpdate, ApiError> {
        validate_item_name(name)?;
        let payload = payload.ok_or_else(|| ApiError::validation("missing request body"))?;
        let write = PropertyPayload::from_json(payload)?.into_write(name)?;
        let (stored, existed) = ctx.session.set_property(&node.id, write).await?;
        // read through the node again so the representation reflects live state
        let node = ctx.session.node_by_id(&node.id).await?;
        let repr = repr::property_repr(ctx, &node, &stored).await?;
        Ok(CreateOrUpdate {
            updated: existed,
            repr: Representation::Property(repr),
        })
    }

    async fn delete(
        &self,
        ctx: &RequestContext<'_>,
        node: &NodeData,
        name: &str,
    ) -> Result<(), ApiError> {
        ctx.session
            .remove_property(&node.id, name)
            .await
            .map_err(ApiError::from)
    }
}
