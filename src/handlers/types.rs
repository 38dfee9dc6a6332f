//! Structured query by node type. Uses the representation builder for its
//! results but stays outside the accessor dispatch.

use crate::dispatch::ApiResponse;
use crate::error::ApiError;
use crate::escape::unescape;
use crate::links::UriBuilder;
use crate::repo::QueryOrder;
use crate::repr::{self, Representation};
use crate::session::{RequestContext, SessionScope};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use serde::Deserialize;

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

#[derive(Debug, Default, Deserialize)]
pub struct TypeQuery {
    #[serde(rename = "nameContains")]
    pub name_contains: Option<String>,
    #[serde(rename = "orderBy")]
    pub order_by: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub depth: Option<u32>,
}

pub async fn query_type(
    State(state): State<AppState>,
    Path((workspace, locale, type_segment)): Path<(String, String, String)>,
    Query(query): Query<TypeQuery>,
) -> Result<ApiResponse, ApiError> {
    let type_name = unescape(&type_segment);
    if state
        .config
        .denied_query_types
        .iter()
        .any(|t| *t == type_name)
    {
        return Err(ApiError::forbidden(format!(
            "node type '{type_name}' cannot be queried"
        )));
    }
    let order = match query.order_by.as_deref() {
        None | Some("name") => QueryOrder::Name,
        Some("path") => QueryOrder::Path,
        Some(other) => {
            return Err(ApiError::validation(format!(
                "unsupported orderBy '{other}'"
            )))
        }
    };
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let offset = query.offset.unwrap_or(0);
    let depth = query.depth.unwrap_or(0);

    let scope = SessionScope::open(state.repo.as_ref(), &state.config, &workspace, &locale).await?;
    let uris = UriBuilder::new(&state.config, scope.workspace(), scope.locale());
    let outcome = async {
        let ctx = RequestContext::new(&scope, &uris, depth);
        let nodes = ctx
            .session
            .query_by_type(&type_name, query.name_contains.as_deref(), order, limit, offset)
            .await?;
        let mut results = Vec::with_capacity(nodes.len());
        for node in nodes {
            results.push(Representation::Node(repr::node_repr(&ctx, node, depth).await?));
        }
        Ok(ApiResponse::OkList(results))
    }
    .await;
    scope.finish(outcome).await
}
