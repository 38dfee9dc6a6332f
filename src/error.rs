//! Typed errors, operation context, and HTTP mapping.

use crate::repo::RepoError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiErrorKind {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("repository: {0}")]
    Repository(String),
}

/// What the request was doing when it failed. Attached once, at the dispatch
/// boundary, and echoed in the error body for debugging.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorContext {
    pub operation: &'static str,
    pub access: &'static str,
    pub locator: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

#[derive(Debug)]
pub struct ApiError {
    kind: ApiErrorKind,
    context: Option<Box<ErrorContext>>,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ApiErrorKind::NotFound(message.into()).into()
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        ApiErrorKind::Unsupported(message.into()).into()
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiErrorKind::Validation(message.into()).into()
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiErrorKind::Forbidden(message.into()).into()
    }

    pub fn repository(message: impl Into<String>) -> Self {
        ApiErrorKind::Repository(message.into()).into()
    }

    pub fn kind(&self) -> &ApiErrorKind {
        &self.kind
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ApiErrorKind::NotFound(_))
    }

    /// Attach operation context. The first context wins; nested layers never
    /// overwrite what the dispatch boundary recorded.
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        if self.context.is_none() {
            self.context = Some(Box::new(context));
        }
        self
    }

    /// Stable class name surfaced in the error body.
    fn class(&self) -> &'static str {
        match self.kind {
            ApiErrorKind::NotFound(_) => "NotFound",
            ApiErrorKind::Unsupported(_) => "UnsupportedOperation",
            ApiErrorKind::Validation(_) => "ValidationError",
            ApiErrorKind::Forbidden(_) => "Forbidden",
            ApiErrorKind::Repository(_) => "RepositoryError",
        }
    }

    fn status(&self) -> StatusCode {
        match self.kind {
            ApiErrorKind::NotFound(_) => StatusCode::NOT_FOUND,
            ApiErrorKind::Unsupported(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiErrorKind::Validation(_) => StatusCode::BAD_REQUEST,
            ApiErrorKind::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiErrorKind::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.kind.fmt(f)
    }
}

impl std::error::Error for ApiError {}

impl From<ApiErrorKind> for ApiError {
    fn from(kind: ApiErrorKind) -> Self {
        Self { kind, context: None }
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(what) => ApiError::not_found(what),
            RepoError::Backend(message) => ApiError::repository(message),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(flatten)]
    pub context: Option<ErrorContext>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.class(),
            message: self.to_string(),
            context: self.context.map(|c| *c),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_not_found_maps_to_404() {
        let err: ApiError = RepoError::NotFound("node x".into()).into();
        assert!(err.is_not_found());
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.class(), "NotFound");
    }

    #[test]
    fn first_context_wins() {
        let ctx = |locator: &str| ErrorContext {
            operation: "read",
            access: "byId",
            locator: locator.into(),
            kind: "properties".into(),
            names: vec![],
            payload: None,
        };
        let err = ApiError::repository("boom")
            .with_context(ctx("first"))
            .with_context(ctx("second"));
        assert_eq!(err.context.unwrap().locator, "first");
    }
}
