use std::sync::Mutex;

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use super::service::end_session;
use crate::api::client::REFRESH_PATH;
use crate::api::{ApiClient, ApiError, ApiRequest};
use crate::models::AuthResponse;

/// Where the refresh protocol stands. `Renewed` and `Failed` describe the
/// most recent attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
    Renewed,
    Failed,
}

/// Renews the access token with the stored refresh credential.
///
/// Attempts are single-flight: one renewal runs at a time, and requests
/// that were rejected with a token that has since been replaced reuse that
/// result instead of renewing again. A failed renewal ends the session.
pub struct RefreshProtocol {
    gate: AsyncMutex<()>,
    state: Mutex<RefreshState>,
}

impl RefreshProtocol {
    pub fn new() -> Self {
        Self {
            gate: AsyncMutex::new(()),
            state: Mutex::new(RefreshState::Idle),
        }
    }

    pub fn state(&self) -> RefreshState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or(RefreshState::Idle)
    }

    fn set_state(&self, next: RefreshState) {
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }

    /// Renew unconditionally. Returns whether the session was renewed.
    pub async fn renew(&self, api: &ApiClient) -> bool {
        let _gate = self.gate.lock().await;
        self.run(api).await
    }

    /// Renew on behalf of a request that was rejected while carrying
    /// `rejected_token`.
    pub async fn renew_after(&self, api: &ApiClient, rejected_token: Option<&str>) -> bool {
        let _gate = self.gate.lock().await;

        match api.session().access_token() {
            Some(current) if Some(current.as_str()) != rejected_token => {
                debug!("Token already renewed by a concurrent refresh");
                return true;
            }
            None if rejected_token.is_some() => {
                debug!("Session ended while waiting to refresh");
                return false;
            }
            _ => {}
        }

        self.run(api).await
    }

    async fn run(&self, api: &ApiClient) -> bool {
        self.set_state(RefreshState::Refreshing);

        let renewed = match Self::exchange(api).await {
            Ok(auth) => {
                api.session().establish(&auth);
                info!(user_id = %auth.user.id, "Session renewed");
                true
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, ending session");
                end_session(api).await;
                false
            }
        };

        self.set_state(if renewed {
            RefreshState::Renewed
        } else {
            RefreshState::Failed
        });
        renewed
    }

    async fn exchange(api: &ApiClient) -> Result<AuthResponse, ApiError> {
        let Some(refresh_token) = api.session().refresh_token() else {
            debug!("No refresh credential stored");
            return Err(ApiError::SessionExpired);
        };

        let request = ApiRequest::post(REFRESH_PATH)
            .refresh_cookie(&refresh_token)
            .without_bearer();
        let response = api.execute(&request, None).await?;
        let response = ApiClient::check_response(response).await?;
        ApiClient::read_json(response).await
    }
}

impl Default for RefreshProtocol {
    fn default() -> Self {
        Self::new()
    }
}
