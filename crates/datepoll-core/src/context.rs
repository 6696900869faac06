use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::api::{ApiClient, ApiError};
use crate::auth::{AuthService, CredentialStore, SessionState};
use crate::config::Config;
use crate::guard::{AccessGuard, Navigator, RouteTable};
use crate::polls::PollsApi;

/// The single session of a process together with everything that reads
/// it. Built once and handed to whoever needs the session; there is no
/// global instance.
#[derive(Clone)]
pub struct AppContext {
    pub session: Arc<SessionState>,
    pub navigator: Arc<dyn Navigator>,
    pub api: ApiClient,
    pub auth: AuthService,
    pub guard: AccessGuard,
}

impl AppContext {
    pub fn new(
        config: &Config,
        store: CredentialStore,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let session = Arc::new(SessionState::new(store));
        let api = ApiClient::from_config(config, Arc::clone(&session), Arc::clone(&navigator))?;
        let auth = AuthService::new(api.clone());
        let guard = AccessGuard::new(RouteTable::default(), config.app_name.clone());

        Ok(Self {
            session,
            navigator,
            api,
            auth,
            guard,
        })
    }

    /// Build with the credential store the configuration selects.
    pub fn from_config(config: &Config, navigator: Arc<dyn Navigator>) -> Result<Self> {
        let store = config
            .credential_store()
            .context("Failed to open credential store")?;
        Self::new(config, store, navigator).context("Failed to create API client")
    }

    pub fn polls(&self) -> PollsApi {
        PollsApi::new(self.api.clone())
    }

    /// Run the access guard for a navigation to `full_path`.
    pub fn visit(&self, full_path: &str) -> crate::guard::GuardDecision {
        self.guard
            .before_each(full_path, &self.session, self.navigator.as_ref())
    }
}
