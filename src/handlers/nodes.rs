//! Node CRUD by identifier, including the batch surface on containers and
//! the rename/moveto endpoints.

use crate::dispatch::{self, AccessMode, ApiResponse, DispatchRequest, Operation};
use crate::error::ApiError;
use crate::escape::unescape;
use crate::resolve::split_sub_path;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
pub struct NodeQuery {
    pub depth: Option<u32>,
    /// Comma-separated escaped sub-element names; turns a container GET into
    /// a batch read.
    pub names: Option<String>,
}

fn request(
    workspace: String,
    locale: String,
    locator: String,
    kind_segment: String,
    name: String,
    depth: u32,
) -> DispatchRequest {
    DispatchRequest {
        workspace,
        locale,
        access: AccessMode::ById,
        locator,
        kind_segment,
        name,
        depth,
    }
}

fn split_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(unescape)
        .collect()
}

pub async fn get_root(
    State(state): State<AppState>,
    Path((workspace, locale)): Path<(String, String)>,
    Query(query): Query<NodeQuery>,
) -> Result<ApiResponse, ApiError> {
    let depth = query.depth.unwrap_or(0);
    let req = request(workspace, locale, String::new(), String::new(), String::new(), depth);
    dispatch::perform(&state, req, Operation::Read, None).await
}

pub async fn get_node(
    State(state): State<AppState>,
    Path((workspace, locale, id)): Path<(String, String, String)>,
    Query(query): Query<NodeQuery>,
) -> Result<ApiResponse, ApiError> {
    let depth = query.depth.unwrap_or(0);
    let req = request(workspace, locale, id, String::new(), String::new(), depth);
    dispatch::perform(&state, req, Operation::Read, None).await
}

pub async fn get_node_sub(
    State(state): State<AppState>,
    Path((workspace, locale, id, sub)): Path<(String, String, String, String)>,
    Query(query): Query<NodeQuery>,
) -> Result<ApiResponse, ApiError> {
    let depth = query.depth.unwrap_or(0);
    let (kind_segment, name) = split_sub_path(&sub);
    if name.is_empty() {
        if let Some(raw) = &query.names {
            let req = request(workspace, locale, id, kind_segment, String::new(), depth);
            return dispatch::perform_batch(
                &state,
                req,
                Operation::Read,
                split_names(raw),
                serde_json::Map::new(),
            )
            .await;
        }
    }
    let req = request(workspace, locale, id, kind_segment, name, depth);
    dispatch::perform(&state, req, Operation::Read, None).await
}

pub async fn put_node(
    State(state): State<AppState>,
    Path((workspace, locale, id)): Path<(String, String, String)>,
    Query(query): Query<NodeQuery>,
    body: Option<Json<Value>>,
) -> Result<ApiResponse, ApiError> {
    let depth = query.depth.unwrap_or(0);
    let req = request(workspace, locale, id, String::new(), String::new(), depth);
    dispatch::perform(&state, req, Operation::CreateOrUpdate, body.map(|Json(v)| v)).await
}

pub async fn put_node_sub(
    State(state): State<AppState>,
    Path((workspace, locale, id, sub)): Path<(String, String, String, String)>,
    Query(query): Query<NodeQuery>,
    body: Option<Json<Value>>,
) -> Result<ApiResponse, ApiError> {
    let depth = query.depth.unwrap_or(0);
    let (kind_segment, name) = split_sub_path(&sub);
    let payload = body.map(|Json(v)| v);
    if name.is_empty() {
        // A PUT on the container itself is the batch form: an object keyed by
        // sub-element name.
        let Some(Value::Object(payloads)) = payload else {
            return Err(ApiError::validation(
                "container update requires a JSON object keyed by name",
            ));
        };
        let names: Vec<String> = payloads.keys().cloned().collect();
        let req = request(workspace, locale, id, kind_segment, String::new(), depth);
        return dispatch::perform_batch(&state, req, Operation::CreateOrUpdate, names, payloads)
            .await;
    }
    let req = request(workspace, locale, id, kind_segment, name, depth);
    dispatch::perform(&state, req, Operation::CreateOrUpdate, payload).await
}

pub async fn delete_node(
    State(state): State<AppState>,
    Path((workspace, locale, id)): Path<(String, String, String)>,
) -> Result<ApiResponse, ApiError> {
    let req = request(workspace, locale, id, String::new(), String::new(), 0);
    dispatch::perform(&state, req, Operation::Delete, None).await
}

pub async fn delete_node_sub(
    State(state): State<AppState>,
    Path((workspace, locale, id, sub)): Path<(String, String, String, String)>,
    body: Option<Json<Value>>,
) -> Result<ApiResponse, ApiError> {
    let (kind_segment, name) = split_sub_path(&sub);
    if name.is_empty() {
        // A DELETE on the container itself is the batch form: an array of
        // sub-element names.
        let names = match body.map(|Json(v)| v) {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect::<Vec<_>>(),
            _ => {
                return Err(ApiError::validation(
                    "container delete requires a JSON array of names",
                ))
            }
        };
        let req = request(workspace, locale, id, kind_segment, String::new(), 0);
        return dispatch::perform_batch(
            &state,
            req,
            Operation::Delete,
            names,
            serde_json::Map::new(),
        )
        .await;
    }
    let req = request(workspace, locale, id, kind_segment, name, 0);
    dispatch::perform(&state, req, Operation::Delete, None).await
}

/// POST on the sub-path serves only the `moveto/{newName}` form; sharing the
/// wildcard route keeps it from conflicting with the catch-all.
pub async fn post_node_sub(
    State(state): State<AppState>,
    Path((workspace, locale, id, sub)): Path<(String, String, String, String)>,
) -> Result<ApiResponse, ApiError> {
    let mut parts = sub.split('/').filter(|s| !s.is_empty());
    match (parts.next(), parts.next(), parts.next()) {
        (Some("moveto"), Some(new_name), None) => {
            dispatch::perform_rename(&state, &workspace, &locale, &id, &unescape(new_name)).await
        }
        _ => Err(ApiError::not_found(format!("no such operation '{sub}'"))),
    }
}

pub async fn rename_node(
    State(state): State<AppState>,
    Path((workspace, locale, id, new_name)): Path<(String, String, String, String)>,
) -> Result<ApiResponse, ApiError> {
    dispatch::perform_rename(&state, &workspace, &locale, &id, &unescape(&new_name)).await
}
