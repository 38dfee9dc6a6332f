//! Startup configuration from `CANOPY_*` environment variables.

/// Resolved once at startup. Link bases (including the node-type catalog
/// base) derive from `api_path`, never from an incoming request URI.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Mount path of the API, prefix of every link this layer emits.
    pub api_path: String,
    /// Externally reachable base (scheme://host[:port]) for `absolute` links.
    pub external_base: Option<String>,
    pub default_workspace: String,
    pub default_locale: String,
    /// Node types the query endpoint refuses to expose.
    pub denied_query_types: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            api_path: "/api".to_string(),
            external_base: None,
            default_workspace: "default".to_string(),
            default_locale: "en".to_string(),
            denied_query_types: Vec::new(),
        }
    }
}

impl ApiConfig {
    /// Read configuration from the environment, falling back to defaults.
    /// The demo server loads `.env` via dotenvy before calling this.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: var("CANOPY_HOST").unwrap_or(defaults.host),
            port: var("CANOPY_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            api_path: var("CANOPY_API_PATH")
                .map(|p| normalize_path(&p))
                .unwrap_or(defaults.api_path),
            external_base: var("CANOPY_BASE_URI").map(|b| b.trim_end_matches('/').to_string()),
            default_workspace: var("CANOPY_DEFAULT_WORKSPACE").unwrap_or(defaults.default_workspace),
            default_locale: var("CANOPY_DEFAULT_LOCALE").unwrap_or(defaults.default_locale),
            denied_query_types: var("CANOPY_DENIED_QUERY_TYPES")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Ensure a leading slash and no trailing slash.
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
