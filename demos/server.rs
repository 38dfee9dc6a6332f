//! Demo server: env config, tracing, an in-memory repository with seeded
//! content, and the full route set.

use canopy::repo::{MemoryRepository, NodeTypeData, PropertyType, PropertyValue, PropertyWrite};
use canopy::{api_routes, ApiConfig, AppState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("canopy=info".parse()?))
        .init();

    let config = ApiConfig::from_env();
    let repo = Arc::new(MemoryRepository::new());
    seed_demo_content(&repo)?;

    let state = AppState::new(repo, config.clone());
    let app = api_routes(state);

    let listener = TcpListener::bind(config.server_address()).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

fn seed_demo_content(repo: &MemoryRepository) -> Result<(), Box<dyn std::error::Error>> {
    repo.register_type(NodeTypeData {
        name: "doc:article".to_string(),
        property_definitions: vec!["title".to_string(), "body".to_string()],
        mixin: false,
    });
    repo.register_type(NodeTypeData {
        name: "doc:taggable".to_string(),
        property_definitions: vec!["tags".to_string()],
        mixin: true,
    });

    repo.seed_node("default", "", "content", "sys:unstructured", vec![])?;
    let string_prop = |name: &str, value: &str| PropertyWrite {
        name: name.to_string(),
        ptype: None,
        value: PropertyValue::Single(serde_json::json!(value)),
    };
    repo.seed_node(
        "default",
        "/content",
        "welcome",
        "doc:article",
        vec![
            string_prop("title", "Welcome"),
            string_prop("body", "A tree-structured content store over REST."),
        ],
    )?;
    let about = repo.seed_node(
        "default",
        "/content",
        "about",
        "doc:article",
        vec![
            string_prop("title", "About"),
            string_prop("body", "Nodes, properties, mixins, versions."),
        ],
    )?;
    repo.seed_node(
        "default",
        "/content",
        "links",
        "sys:unstructured",
        vec![PropertyWrite {
            name: "featured".to_string(),
            ptype: Some(PropertyType::Reference),
            value: PropertyValue::Single(serde_json::json!(about)),
        }],
    )?;
    repo.seed_mixin("default", "/content/about", "doc:taggable")?;
    repo.seed_version("default", "/content/about", "1.0")?;
    repo.seed_version("default", "/content/about", "1.1")?;
    Ok(())
}
