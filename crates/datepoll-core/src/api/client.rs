//! Request pipeline for the backend REST API.
//!
//! Every outbound call goes through `ApiClient::send`, which attaches the
//! session's access token and turns a 401 into at most one refresh-and-replay
//! before the caller ever sees it.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::auth::{RefreshProtocol, SessionState};
use crate::config::Config;
use crate::guard::{Location, Navigator};

use super::{ApiError, ApiRequest};

// ============================================================================
// Constants
// ============================================================================

/// Backend address used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// HTTP request timeout in seconds. A request that takes longer fails as a
/// network error.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

pub(crate) const LOGIN_PATH: &str = "/api/auth/login";
pub(crate) const REGISTER_PATH: &str = "/api/auth/register";
pub(crate) const LOGOUT_PATH: &str = "/api/auth/logout";
pub(crate) const REFRESH_PATH: &str = "/api/auth/refresh";
pub(crate) const ME_PATH: &str = "/api/auth/me";
pub(crate) const PROFILE_PATH: &str = "/api/auth/profile";
pub(crate) const PASSWORD_PATH: &str = "/api/auth/password";
pub(crate) const OAUTH_LOGIN_PATH: &str = "/auth/google/login";

/// Cookie the backend reads the refresh credential from.
const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// API client bound to one session.
/// Clone is cheap - reqwest::Client and the session are reference counted.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Arc<str>,
    session: Arc<SessionState>,
    refresh: Arc<RefreshProtocol>,
    navigator: Arc<dyn Navigator>,
}

impl ApiClient {
    /// Create a client with the default request timeout.
    pub fn new(
        base_url: &str,
        session: Arc<SessionState>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        Self::with_timeout(
            base_url,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
            session,
            navigator,
        )
    }

    pub fn with_timeout(
        base_url: &str,
        timeout: Duration,
        session: Arc<SessionState>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(Self::default_headers())
            .build()?;

        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            session,
            refresh: Arc::new(RefreshProtocol::new()),
            navigator,
        })
    }

    pub fn from_config(
        config: &Config,
        session: Arc<SessionState>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        Self::with_timeout(&config.api_base_url, config.request_timeout(), session, navigator)
    }

    fn default_headers() -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        headers
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    pub fn refresh_protocol(&self) -> &RefreshProtocol {
        &self.refresh
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_headers(request: &ApiRequest, token: Option<&str>) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|_| ApiError::InvalidRequest("Token is not a valid header value".to_string()))?,
            );
        }
        if let Some(refresh_token) = request.cookie() {
            headers.insert(
                header::COOKIE,
                header::HeaderValue::from_str(&format!("{}={}", REFRESH_COOKIE_NAME, refresh_token))
                    .map_err(|_| ApiError::InvalidRequest("Refresh token is not a valid cookie value".to_string()))?,
            );
        }
        Ok(headers)
    }

    /// Send `request` once with the given bearer token. No 401 handling.
    pub(crate) async fn execute(&self, request: &ApiRequest, token: Option<&str>) -> Result<Response, ApiError> {
        let url = self.url(request.path());
        debug!(
            method = %request.method(),
            path = request.path(),
            authenticated = token.is_some(),
            retried = request.is_retried(),
            "Sending request"
        );

        let mut builder = self
            .client
            .request(request.method().clone(), &url)
            .headers(Self::auth_headers(request, token)?);
        if !request.query_pairs().is_empty() {
            builder = builder.query(request.query_pairs());
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(path = request.path(), timeout = e.is_timeout(), "Request failed: {}", e);
            ApiError::Network(e)
        })?;
        debug!(path = request.path(), status = %response.status(), "Response received");
        Ok(response)
    }

    /// Send a request through the pipeline.
    ///
    /// The current access token is attached in bearer form. A 401 on a
    /// request that is eligible for refresh and has not been replayed yet
    /// runs the refresh protocol and replays the request once with the new
    /// token. If the refresh fails the session is gone: the navigator is sent
    /// to the login view and `ApiError::SessionExpired` is returned.
    pub async fn send(&self, mut request: ApiRequest) -> Result<Response, ApiError> {
        loop {
            let token = if request.wants_bearer() {
                self.session.access_token()
            } else {
                None
            };
            let response = self.execute(&request, token.as_deref()).await?;

            if response.status() != StatusCode::UNAUTHORIZED
                || request.skips_refresh()
                || request.is_retried()
            {
                return Self::check_response(response).await;
            }

            request.mark_retried();
            debug!(path = request.path(), "Unauthorized, attempting token refresh");
            if !self.refresh.renew_after(self, token.as_deref()).await {
                self.redirect_to_login();
                return Err(ApiError::SessionExpired);
            }
        }
    }

    fn redirect_to_login(&self) {
        let current = self.navigator.current_path();
        self.navigator
            .navigate(Location::login_returning_to(current.as_deref()));
    }

    /// Check if response is successful, returning an error with body if not.
    pub(crate) async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON response: {}", e)))
    }

    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        Self::read_json(response).await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json(ApiRequest::get(path)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.send_json(ApiRequest::post(path).json(body)?).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.send_json(ApiRequest::put(path).json(body)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(ApiRequest::delete(path)).await?;
        Ok(())
    }
}
