//! Node reads by path. The kind-suffix grammar of the by-identifier routes
//! applies unchanged; the resolver decides where the locator stops.

use crate::dispatch::{self, AccessMode, ApiResponse, DispatchRequest, Operation};
use crate::error::ApiError;
use crate::escape::unescape;
use crate::handlers::nodes::NodeQuery;
use crate::resolve::resolve_path;
use crate::state::AppState;
use axum::extract::{Path, Query, State};

pub async fn get_root(
    State(state): State<AppState>,
    Path((workspace, locale)): Path<(String, String)>,
    Query(query): Query<NodeQuery>,
) -> Result<ApiResponse, ApiError> {
    let req = DispatchRequest {
        workspace,
        locale,
        access: AccessMode::ByPath,
        locator: String::new(),
        kind_segment: String::new(),
        name: String::new(),
        depth: query.depth.unwrap_or(0),
    };
    dispatch::perform(&state, req, Operation::Read, None).await
}

pub async fn get_by_path(
    State(state): State<AppState>,
    Path((workspace, locale, rest)): Path<(String, String, String)>,
    Query(query): Query<NodeQuery>,
) -> Result<ApiResponse, ApiError> {
    let resolved = resolve_path(&rest);
    let depth = query.depth.unwrap_or(0);
    let req = DispatchRequest {
        workspace,
        locale,
        access: AccessMode::ByPath,
        locator: resolved.locator,
        kind_segment: resolved.kind_segment,
        name: resolved.sub_element,
        depth,
    };
    if req.name.is_empty() && !req.kind_segment.is_empty() {
        if let Some(raw) = &query.names {
            let names = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(unescape)
                .collect();
            return dispatch::perform_batch(
                &state,
                req,
                Operation::Read,
                names,
                serde_json::Map::new(),
            )
            .await;
        }
    }
    dispatch::perform(&state, req, Operation::Read, None).await
}
