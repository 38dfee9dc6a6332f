//! HTTP handlers.

pub mod nodes;
pub mod paths;
pub mod types;

use axum::Json;
use serde::Serialize;

/// Plain-text API version string.
pub async fn api_version() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}

#[derive(Serialize)]
pub struct HealthBody {
    pub status: &'static str,
}

pub async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}
