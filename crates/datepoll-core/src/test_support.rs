//! Shared fixtures for tests that talk to a mock backend.

use std::sync::Arc;

use crate::auth::{CredentialBackend, CredentialStore, MemoryBackend};
use crate::config::Config;
use crate::context::AppContext;
use crate::guard::HistoryNavigator;
use crate::models::AuthResponse;

pub(crate) struct Harness {
    pub ctx: AppContext,
    pub backend: MemoryBackend,
    pub navigator: Arc<HistoryNavigator>,
}

impl Harness {
    pub fn new(base_url: &str) -> Self {
        Self::with_navigator(base_url, HistoryNavigator::new(), 5)
    }

    pub fn with_timeout_secs(base_url: &str, timeout_secs: u64) -> Self {
        Self::with_navigator(base_url, HistoryNavigator::new(), timeout_secs)
    }

    /// Harness whose navigator is already showing `path`.
    pub fn starting_at(base_url: &str, path: &str) -> Self {
        Self::with_navigator(base_url, HistoryNavigator::starting_at(path), 5)
    }

    fn with_navigator(base_url: &str, navigator: HistoryNavigator, timeout_secs: u64) -> Self {
        let config = Config {
            api_base_url: base_url.to_string(),
            request_timeout_secs: timeout_secs,
            ..Config::default()
        };
        let backend = MemoryBackend::new();
        let navigator = Arc::new(navigator);
        let ctx = AppContext::new(&config, CredentialStore::new(backend.clone()), navigator.clone())
            .expect("Failed to build test context");
        Self {
            ctx,
            backend,
            navigator,
        }
    }

    /// Put the session in the signed-in state without a login call.
    pub fn sign_in(&self, token: &str, refresh_token: &str) {
        let auth: AuthResponse = serde_json::from_str(&auth_body(token, refresh_token))
            .expect("Failed to parse auth fixture");
        self.ctx.session.establish(&auth);
    }

    pub fn stored(&self, key: &str) -> Option<String> {
        self.backend.get(key).expect("Failed to read backend")
    }

    pub fn backend_set(&self, key: &str, value: &str) {
        self.backend.set(key, value).expect("Failed to write backend");
    }
}

/// Login/register/refresh response body for user `{id: 1, name: "A"}`.
pub(crate) fn auth_body(token: &str, refresh_token: &str) -> String {
    serde_json::json!({
        "token": token,
        "refresh_token": refresh_token,
        "user": {"id": 1, "name": "A", "email": "a@b.com"}
    })
    .to_string()
}
