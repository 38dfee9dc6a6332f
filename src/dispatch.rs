//! Operation dispatch: kind lookup, session lifecycle, accessor invocation,
//! and mapping of results onto HTTP responses.

use crate::accessor::{accessor_for, SubElementKind};
use crate::error::{ApiError, ErrorContext};
use crate::links::UriBuilder;
use crate::repo::NodeData;
use crate::repr::{self, Representation};
use crate::session::{RequestContext, SessionScope};
use crate::service::validate_item_name;
use crate::state::AppState;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    CreateOrUpdate,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::CreateOrUpdate => "createOrUpdate",
            Operation::Delete => "delete",
        }
    }
}

/// How the target node is located.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ById,
    ByPath,
}

impl AccessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::ById => "byId",
            AccessMode::ByPath => "byPath",
        }
    }
}

/// The addressing part of one dispatchable request.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub workspace: String,
    pub locale: String,
    pub access: AccessMode,
    /// Identifier or unescaped path; empty addresses the root.
    pub locator: String,
    /// Reserved kind marker, or empty for the node itself.
    pub kind_segment: String,
    /// Unescaped sub-element name; empty addresses the container.
    pub name: String,
    pub depth: u32,
}

/// Dispatch result, one variant per response shape.
#[derive(Debug)]
pub enum ApiResponse {
    Ok(Representation),
    OkList(Vec<Representation>),
    Created { location: String, repr: Representation },
    NoContent,
    SeeOther(String),
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        match self {
            ApiResponse::Ok(repr) => (StatusCode::OK, Json(repr)).into_response(),
            ApiResponse::OkList(list) => (StatusCode::OK, Json(list)).into_response(),
            ApiResponse::Created { location, repr } => (
                StatusCode::CREATED,
                [(header::LOCATION, location)],
                Json(repr),
            )
                .into_response(),
            ApiResponse::NoContent => StatusCode::NO_CONTENT.into_response(),
            ApiResponse::SeeOther(location) => {
                (StatusCode::SEE_OTHER, [(header::LOCATION, location)]).into_response()
            }
        }
    }
}

/// Perform one operation on the addressed item.
///
/// Opens a request-scoped session, resolves the target node, invokes the
/// accessor registered for the kind, then commits on success or closes
/// without committing on any error. Errors leave here with full operation
/// context attached.
pub async fn perform(
    state: &AppState,
    req: DispatchRequest,
    operation: Operation,
    payload: Option<Value>,
) -> Result<ApiResponse, ApiError> {
    let context = request_context(&req, operation, payload.as_ref());
    tracing::debug!(
        operation = operation.as_str(),
        access = req.access.as_str(),
        locator = %req.locator,
        kind = %req.kind_segment,
        name = %req.name,
        "dispatch"
    );
    let Some(kind) = SubElementKind::from_segment(&req.kind_segment) else {
        return Err(ApiError::not_found(format!(
            "unrecognized sub-element kind '{}'",
            req.kind_segment
        ))
        .with_context(context));
    };
    let scope = match SessionScope::open(
        state.repo.as_ref(),
        &state.config,
        &req.workspace,
        &req.locale,
    )
    .await
    {
        Ok(scope) => scope,
        Err(err) => return Err(err.with_context(context)),
    };
    let uris = UriBuilder::new(&state.config, scope.workspace(), scope.locale());
    let outcome = execute_single(&scope, &uris, &req, kind, operation, payload).await;
    scope
        .finish(outcome)
        .await
        .map_err(|err| err.with_context(context))
}

/// Batch variant: one operation over several sub-element names. Reads return
/// the entries that exist; mutations tolerate missing entries and answer
/// See Other pointing at the container.
pub async fn perform_batch(
    state: &AppState,
    req: DispatchRequest,
    operation: Operation,
    names: Vec<String>,
    payloads: Map<String, Value>,
) -> Result<ApiResponse, ApiError> {
    let context = ErrorContext {
        operation: operation.as_str(),
        access: req.access.as_str(),
        locator: req.locator.clone(),
        kind: req.kind_segment.clone(),
        names: names.clone(),
        payload: None,
    };
    let Some(kind) = SubElementKind::from_segment(&req.kind_segment) else {
        return Err(ApiError::not_found(format!(
            "unrecognized sub-element kind '{}'",
            req.kind_segment
        ))
        .with_context(context));
    };
    if kind == SubElementKind::Node {
        return Err(
            ApiError::validation("batch operations require a sub-element kind")
                .with_context(context),
        );
    }
    let scope = match SessionScope::open(
        state.repo.as_ref(),
        &state.config,
        &req.workspace,
        &req.locale,
    )
    .await
    {
        Ok(scope) => scope,
        Err(err) => return Err(err.with_context(context)),
    };
    let uris = UriBuilder::new(&state.config, scope.workspace(), scope.locale());
    let outcome = execute_batch(&scope, &uris, &req, kind, operation, &names, &payloads).await;
    scope
        .finish(outcome)
        .await
        .map_err(|err| err.with_context(context))
}

/// Rename a node and answer See Other pointing at its (identifier-stable)
/// resource.
pub async fn perform_rename(
    state: &AppState,
    workspace: &str,
    locale: &str,
    id: &str,
    new_name: &str,
) -> Result<ApiResponse, ApiError> {
    let context = ErrorContext {
        operation: "rename",
        access: AccessMode::ById.as_str(),
        locator: id.to_string(),
        kind: String::new(),
        names: vec![new_name.to_string()],
        payload: None,
    };
    if let Err(err) = validate_item_name(new_name) {
        return Err(err.with_context(context));
    }
    let scope = match SessionScope::open(state.repo.as_ref(), &state.config, workspace, locale)
        .await
    {
        Ok(scope) => scope,
        Err(err) => return Err(err.with_context(context)),
    };
    let uris = UriBuilder::new(&state.config, scope.workspace(), scope.locale());
    let outcome = async {
        let node = scope.session().node_by_id(id).await?;
        let renamed = scope.session().rename_node(&node.id, new_name).await?;
        Ok(ApiResponse::SeeOther(uris.node(&renamed.id)))
    }
    .await;
    scope
        .finish(outcome)
        .await
        .map_err(|err| err.with_context(context))
}

fn request_context(
    req: &DispatchRequest,
    operation: Operation,
    payload: Option<&Value>,
) -> ErrorContext {
    ErrorContext {
        operation: operation.as_str(),
        access: req.access.as_str(),
        locator: req.locator.clone(),
        kind: req.kind_segment.clone(),
        names: if req.name.is_empty() {
            Vec::new()
        } else {
            vec![req.name.clone()]
        },
        payload: payload.cloned(),
    }
}

async fn resolve_node(
    ctx: &RequestContext<'_>,
    access: AccessMode,
    locator: &str,
) -> Result<NodeData, ApiError> {
    let node = match access {
        AccessMode::ById if locator.is_empty() => ctx.session.root().await?,
        AccessMode::ById => ctx.session.node_by_id(locator).await?,
        AccessMode::ByPath => ctx.session.node_by_path(locator).await?,
    };
    Ok(node)
}

async fn execute_single(
    scope: &SessionScope,
    uris: &UriBuilder,
    req: &DispatchRequest,
    kind: SubElementKind,
    operation: Operation,
    payload: Option<Value>,
) -> Result<ApiResponse, ApiError> {
    let ctx = RequestContext::new(scope, uris, req.depth);
    let node = resolve_node(&ctx, req.access, &req.locator).await?;
    let accessor = accessor_for(kind);
    match operation {
        Operation::Read => {
            if req.name.is_empty() {
                // The identity kind has no container; an empty-name read is
                // the node's own representation.
                if kind == SubElementKind::Node {
                    let repr = repr::node_repr(&ctx, node, req.depth).await?;
                    Ok(ApiResponse::Ok(Representation::Node(repr)))
                } else {
                    Ok(ApiResponse::Ok(accessor.container(&ctx, &node).await?))
                }
            } else {
                Ok(ApiResponse::Ok(accessor.entry(&ctx, &node, &req.name).await?))
            }
        }
        Operation::CreateOrUpdate => {
            let result = accessor
                .create_or_update(&ctx, &node, &req.name, payload)
                .await?;
            if result.updated {
                Ok(ApiResponse::Ok(result.repr))
            } else {
                let location = result.repr.self_href().unwrap_or_default().to_string();
                Ok(ApiResponse::Created {
                    location,
                    repr: result.repr,
                })
            }
        }
        Operation::Delete => {
            accessor.delete(&ctx, &node, &req.name).await?;
            Ok(ApiResponse::NoContent)
        }
    }
}

async fn execute_batch(
    scope: &SessionScope,
    uris: &UriBuilder,
    req: &DispatchRequest,
    kind: SubElementKind,
    operation: Operation,
    names: &[String],
    payloads: &Map<String, Value>,
) -> Result<ApiResponse, ApiError> {
    let ctx = RequestContext::new(scope, uris, req.depth);
    let node = resolve_node(&ctx, req.access, &req.locator).await?;
    let accessor = accessor_for(kind);
    let container_uri = format!("{}/{}", uris.node(&node.id), kind.marker());
    match operation {
        Operation::Read => {
            let mut found = Vec::new();
            for name in names {
                match accessor.entry(&ctx, &node, name).await {
                    Ok(repr) => found.push(repr),
                    Err(err) if err.is_not_found() => {}
                    Err(err) => return Err(err),
                }
            }
            Ok(ApiResponse::OkList(found))
        }
        Operation::Delete => {
            for name in names {
                match accessor.delete(&ctx, &node, name).await {
                    Ok(()) => {}
                    Err(err) if err.is_not_found() => {}
                    Err(err) => return Err(err),
                }
            }
            Ok(ApiResponse::SeeOther(container_uri))
        }
        Operation::CreateOrUpdate => {
            for name in names {
                let payload = payloads.get(name).cloned();
                accessor
                    .create_or_update(&ctx, &node, name, payload)
                    .await?;
            }
            Ok(ApiResponse::SeeOther(container_uri))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::error::ApiErrorKind;
    use crate::repo::{MemoryRepository, PropertyValue, PropertyWrite, Repository};
    use serde_json::json;
    use std::sync::Arc;

    fn seeded() -> (Arc<MemoryRepository>, AppState, String) {
        let repo = Arc::new(MemoryRepository::new());
        repo.seed_node("default", "", "content", "sys:unstructured", vec![])
            .unwrap();
        let article_id = repo
            .seed_node(
                "default",
                "/content",
                "article",
                "doc:article",
                vec![
                    PropertyWrite {
                        name: "title".into(),
                        ptype: None,
                        value: PropertyValue::Single(json!("hello")),
                    },
                    PropertyWrite {
                        name: "rating".into(),
                        ptype: None,
                        value: PropertyValue::Single(json!(4)),
                    },
                ],
            )
            .unwrap();
        repo.seed_version("default", "/content/article", "1.0").unwrap();
        let state = AppState {
            repo: repo.clone(),
            config: Arc::new(ApiConfig::default()),
        };
        (repo, state, article_id)
    }

    fn request(locator: &str, kind: &str, name: &str) -> DispatchRequest {
        DispatchRequest {
            workspace: "default".into(),
            locale: "en".into(),
            access: AccessMode::ById,
            locator: locator.into(),
            kind_segment: kind.into(),
            name: name.into(),
            depth: 0,
        }
    }

    #[tokio::test]
    async fn read_of_existing_entry_is_ok() {
        let (_, state, id) = seeded();
        let response = perform(
            &state,
            request(&id, "properties", "title"),
            Operation::Read,
            None,
        )
        .await
        .unwrap();
        assert!(matches!(response, ApiResponse::Ok(Representation::Property(_))));
    }

    #[tokio::test]
    async fn read_of_missing_entry_is_not_found() {
        let (_, state, id) = seeded();
        let err = perform(
            &state,
            request(&id, "properties", "nope"),
            Operation::Read,
            None,
        )
        .await
        .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn create_of_new_entry_is_created_with_location() {
        let (_, state, id) = seeded();
        let response = perform(
            &state,
            request(&id, "properties", "summary"),
            Operation::CreateOrUpdate,
            Some(json!({"value": "short"})),
        )
        .await
        .unwrap();
        match response {
            ApiResponse::Created { location, .. } => {
                assert_eq!(
                    location,
                    format!("/api/default/en/nodes/{id}/properties/summary")
                );
            }
            other => panic!("expected Created, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn update_of_existing_entry_is_ok() {
        let (_, state, id) = seeded();
        let response = perform(
            &state,
            request(&id, "properties", "title"),
            Operation::CreateOrUpdate,
            Some(json!({"value": "changed"})),
        )
        .await
        .unwrap();
        assert!(matches!(response, ApiResponse::Ok(_)));
    }

    #[tokio::test]
    async fn delete_is_no_content_and_commits() {
        let (repo, state, id) = seeded();
        let response = perform(
            &state,
            request(&id, "properties", "title"),
            Operation::Delete,
            None,
        )
        .await
        .unwrap();
        assert!(matches!(response, ApiResponse::NoContent));
        // committed: a fresh session no longer sees the property
        let session = repo.login("default", "en").await.unwrap();
        let node = session.node_by_id(&id).await.unwrap();
        assert!(node.property("title").is_none());
    }

    #[tokio::test]
    async fn failed_mutation_is_not_committed() {
        let (repo, state, id) = seeded();
        // batch: first name exists, second payload is invalid
        let err = perform_batch(
            &state,
            request(&id, "properties", ""),
            Operation::CreateOrUpdate,
            vec!["title".into(), "bad".into()],
            serde_json::Map::from_iter([
                ("title".to_string(), json!("changed")),
                ("bad".to_string(), json!({"value": 1, "values": [1]})),
            ]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err.kind(), ApiErrorKind::Validation(_)));
        let session = repo.login("default", "en").await.unwrap();
        let node = session.node_by_id(&id).await.unwrap();
        assert_eq!(
            node.property("title").unwrap().value,
            PropertyValue::Single(json!("hello"))
        );
    }

    #[tokio::test]
    async fn session_scope_is_released_on_every_exit_path() {
        let (repo, state, id) = seeded();
        perform(&state, request(&id, "", ""), Operation::Read, None)
            .await
            .unwrap();
        assert_eq!(repo.live_sessions(), 0);

        perform(&state, request(&id, "properties", "nope"), Operation::Read, None)
            .await
            .unwrap_err();
        assert_eq!(repo.live_sessions(), 0);

        perform(&state, request(&id, "versions", "1.0"), Operation::Delete, None)
            .await
            .unwrap_err();
        assert_eq!(repo.live_sessions(), 0);
    }

    #[tokio::test]
    async fn unrecognized_kind_is_request_level_not_found() {
        let (repo, state, id) = seeded();
        let err = perform(&state, request(&id, "attachments", ""), Operation::Read, None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(repo.live_sessions(), 0);
    }

    #[tokio::test]
    async fn versions_are_read_only() {
        let (_, state, id) = seeded();
        let err = perform(
            &state,
            request(&id, "versions", "2.0"),
            Operation::CreateOrUpdate,
            Some(json!({})),
        )
        .await
        .unwrap_err();
        assert!(matches!(err.kind(), ApiErrorKind::Unsupported(_)));
    }

    #[tokio::test]
    async fn batch_delete_tolerates_missing_and_points_at_the_container() {
        let (repo, state, id) = seeded();
        let response = perform_batch(
            &state,
            request(&id, "properties", ""),
            Operation::Delete,
            vec!["title".into(), "missing".into(), "rating".into()],
            serde_json::Map::new(),
        )
        .await
        .unwrap();
        match response {
            ApiResponse::SeeOther(location) => {
                assert_eq!(location, format!("/api/default/en/nodes/{id}/properties"));
            }
            other => panic!("expected SeeOther, got {other:?}"),
        }
        let session = repo.login("default", "en").await.unwrap();
        let node = session.node_by_id(&id).await.unwrap();
        assert!(node.properties.is_empty());
    }

    #[tokio::test]
    async fn batch_read_skips_missing_entries() {
        let (_, state, id) = seeded();
        let response = perform_batch(
            &state,
            request(&id, "properties", ""),
            Operation::Read,
            vec!["title".into(), "missing".into(), "rating".into()],
            serde_json::Map::new(),
        )
        .await
        .unwrap();
        match response {
            ApiResponse::OkList(found) => assert_eq!(found.len(), 2),
            other => panic!("expected OkList, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn by_path_access_resolves_the_same_node() {
        let (_, state, _) = seeded();
        let mut req = request("content/article", "properties", "title");
        req.access = AccessMode::ByPath;
        let response = perform(&state, req, Operation::Read, None).await.unwrap();
        assert!(matches!(response, ApiResponse::Ok(Representation::Property(_))));
    }

    #[tokio::test]
    async fn rename_answers_see_other_at_the_node_uri() {
        let (repo, state, id) = seeded();
        let response = perform_rename(&state, "default", "en", &id, "post")
            .await
            .unwrap();
        match response {
            ApiResponse::SeeOther(location) => {
                assert_eq!(location, format!("/api/default/en/nodes/{id}"));
            }
            other => panic!("expected SeeOther, got {other:?}"),
        }
        let session = repo.login("default", "en").await.unwrap();
        assert!(session.node_by_path("/content/post").await.is_ok());
    }

    #[tokio::test]
    async fn empty_locator_reads_the_root() {
        let (_, state, _) = seeded();
        let response = perform(&state, request("", "", ""), Operation::Read, None)
            .await
            .unwrap();
        match response {
            ApiResponse::Ok(Representation::Node(node)) => {
                assert_eq!(node.name, "");
                assert_eq!(node.type_name, "sys:root");
                assert_eq!(node.links.href("self"), Some("/api/default/en/nodes"));
            }
            other => panic!("expected node, got {other:?}"),
        }
    }
}
