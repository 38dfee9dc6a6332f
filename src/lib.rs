//! Canopy: hypermedia REST layer over a hierarchical content repository.

pub mod accessor;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod escape;
pub mod handlers;
pub mod links;
pub mod repo;
pub mod repr;
pub mod resolve;
pub mod routes;
pub mod service;
pub mod session;
pub mod state;

pub use config::ApiConfig;
pub use dispatch::{perform, perform_batch, perform_rename, ApiResponse, Operation};
pub use error::{ApiError, ApiErrorKind};
pub use repo::{MemoryRepository, Repository, Session};
pub use routes::api_routes;
pub use state::AppState;
