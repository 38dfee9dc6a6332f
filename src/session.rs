//! Request-scoped repository sessions.
//!
//! One session per request: opened with the request's workspace/locale
//! (defaults applied), committed on success, closed on every exit path.
//! Nested representation code reaches the ambient session through an
//! explicit [`RequestContext`] instead of hidden global state.

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::links::UriBuilder;
use crate::repo::{Repository, Session};

/// Owns the boxed session for the duration of one request.
pub struct SessionScope {
    session: Box<dyn Session>,
}

impl SessionScope {
    /// Open a session. Empty workspace or locale falls back to the
    /// configured defaults.
    pub async fn open(
        repo: &dyn Repository,
        config: &ApiConfig,
        workspace: &str,
        locale: &str,
    ) -> Result<Self, ApiError> {
        let workspace = if workspace.is_empty() {
            config.default_workspace.as_str()
        } else {
            workspace
        };
        let locale = if locale.is_empty() {
            config.default_locale.as_str()
        } else {
            locale
        };
        let session = repo.login(workspace, locale).await?;
        Ok(Self { session })
    }

    pub fn session(&self) -> &dyn Session {
        self.session.as_ref()
    }

    pub fn workspace(&self) -> &str {
        self.session.workspace()
    }

    pub fn locale(&self) -> &str {
        self.session.locale()
    }

    /// Settle the scope: save on success, close unconditionally. A save
    /// failure surfaces as the request error; the session still closes.
    pub async fn finish<T>(self, outcome: Result<T, ApiError>) -> Result<T, ApiError> {
        match outcome {
            Ok(value) => {
                let saved = self.session.save().await;
                self.session.close();
                saved.map_err(ApiError::from)?;
                Ok(value)
            }
            Err(err) => {
                self.session.close();
                Err(err)
            }
        }
    }
}

impl Drop for SessionScope {
    fn drop(&mut self) {
        // Backstop for early returns; close is idempotent.
        self.session.close();
    }
}

/// Everything representation building needs from the current request.
pub struct RequestContext<'a> {
    pub session: &'a dyn Session,
    pub uris: &'a UriBuilder,
    /// Requested embedding depth; 0 means links only.
    pub depth: u32,
}

impl<'a> RequestContext<'a> {
    pub fn new(scope: &'a SessionScope, uris: &'a UriBuilder, depth: u32) -> Self {
        Self {
            session: scope.session(),
            uris,
            depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::MemoryRepository;

    #[tokio::test]
    async fn defaults_apply_to_empty_workspace_and_locale() {
        let repo = MemoryRepository::new();
        let config = ApiConfig::default();
        let scope = SessionScope::open(&repo, &config, "", "").await.unwrap();
        assert_eq!(scope.workspace(), "default");
        assert_eq!(scope.locale(), "en");
        scope.finish::<()>(Ok(())).await.unwrap();
        assert_eq!(repo.live_sessions(), 0);
    }

    #[tokio::test]
    async fn finish_closes_on_error_without_saving() {
        let repo = MemoryRepository::new();
        let config = ApiConfig::default();
        let scope = SessionScope::open(&repo, &config, "default", "en")
            .await
            .unwrap();
        let result: Result<(), ApiError> = scope.finish(Err(ApiError::not_found("x"))).await;
        assert!(result.is_err());
        assert_eq!(repo.live_sessions(), 0);
    }

    #[tokio::test]
    async fn drop_is_a_backstop() {
        let repo = MemoryRepository::new();
        let config = ApiConfig::default();
        {
            let _scope = SessionScope::open(&repo, &config, "default", "en")
                .await
                .unwrap();
            assert_eq!(repo.live_sessions(), 1);
        }
        assert_eq!(repo.live_sessions(), 0);
    }
}
