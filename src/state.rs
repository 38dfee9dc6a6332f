//! Shared application state for all routes.

use crate::config::ApiConfig;
use crate::repo::Repository;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub config: Arc<ApiConfig>,
}

impl AppState {
    pub fn new(repo: Arc<dyn Repository>, config: ApiConfig) -> Self {
        Self {
            repo,
            config: Arc::new(config),
        }
    }
}
