//! Accessor for the `versions` facet. Read-only: version creation and pruning
//! belong to the repository engine.

use super::{CreateOrUpdate, SubElementAccessor};
use crate::error::ApiError;
use crate::repo::NodeData;
use crate::repr::{self, Representation};
use crate::session::RequestContext;
use async_trait::async_trait;
use serde_json::Value;

pub struct VersionsAccessor;

#[async_trait]
impl SubElementAccessor for VersionsAccessor {
    async fn container(
        &self,
        ctx: &RequestContext<'_>,
        node: &NodeData,
    ) -> Result<Representation, ApiError> {
        Ok(Representation::Versions(
            repr::versions_repr(ctx, node).await?,
        ))
    }

    async fn entry(
        &self,
        ctx: &RequestContext<'_>,
        node: &NodeData,
        name: &str,
    ) -> Result<Representation, ApiError> {
        let history = ctx.session.version_history(&node.id).await?;
        let position = history
            .iter()
            .position(|v| v.name == name)
            .ok_or_else(|| ApiError::not_found(format!("version '{name}'")))?;
        let previous = position.checked_sub(1).and_then(|i| history.get(i));
        let next = history.get(position + 1);
        Ok(Representation::Version(repr::version_repr(
            ctx,
            node,
            &history[position],
            Some((previous, next)),
        )))
    }

    async fn create_or_update(
        &self,
        _ctx: &RequestContext<'_>,
        _node: &NodeData,
        _name: &str,
        _payload: Option<Value>,
    ) -> Result<CreateOrUpdate, ApiError> {
        Err(ApiError::unsupported("versions are read-only"))
    }

    async fn delete(
        &self,
        _ctx: &RequestContext<'_>,
        _node: &NodeData,
        _name: &str,
    ) -> Result<(), ApiError> {
        Err(ApiError::unsupported("versions are read-only"))
    }
}
