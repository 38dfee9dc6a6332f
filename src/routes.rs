//! Router assembly.

use crate::handlers::{api_version, health, nodes, paths, types};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/version", get(api_version))
        .route("/api/:workspace/:locale/nodes", get(nodes::get_root))
        .route(
            "/api/:workspace/:locale/nodes/:id",
            get(nodes::get_node)
                .put(nodes::put_node)
                .delete(nodes::delete_node),
        )
        .route(
            "/api/:workspace/:locale/nodes/:id/*sub",
            get(nodes::get_node_sub)
                .put(nodes::put_node_sub)
                .delete(nodes::delete_node_sub)
                .post(nodes::post_node_sub),
        )
        .route("/api/:workspace/:locale/byPath", get(paths::get_root))
        .route("/api/:workspace/:locale/byPath/*path", get(paths::get_by_path))
        .route("/api/:workspace/:locale/types/:type", get(types::query_type))
        .route(
            "/api/:workspace/:locale/rename/:id/to/:new_name",
            post(nodes::rename_node),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
