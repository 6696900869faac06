use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use super::ApiError;

/// Path fragments whose 401s must never start a refresh: they are the
/// refresh mechanism itself.
const NON_REFRESHABLE_PATHS: [&str; 2] = ["/auth/logout", "/auth/refresh"];

/// An outbound call, kept as data so it can be sent again after a refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    refresh_cookie: Option<String>,
    bearer: bool,
    intercept: bool,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            refresh_cookie: None,
            bearer: true,
            intercept: true,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to encode body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Convey the refresh credential the way the backend expects it: as the
    /// `refresh_token` cookie.
    pub fn refresh_cookie(mut self, refresh_token: &str) -> Self {
        self.refresh_cookie = Some(refresh_token.to_string());
        self
    }

    /// Never attach the access token.
    pub fn without_bearer(mut self) -> Self {
        self.bearer = false;
        self
    }

    /// Let a 401 reach the caller untouched. For endpoints where 401 means
    /// "wrong secret" rather than "expired token".
    pub fn without_refresh(mut self) -> Self {
        self.intercept = false;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn cookie(&self) -> Option<&str> {
        self.refresh_cookie.as_deref()
    }

    pub fn wants_bearer(&self) -> bool {
        self.bearer
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }

    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
    }

    /// Whether a 401 on this request is returned as-is instead of
    /// triggering a refresh.
    pub fn skips_refresh(&self) -> bool {
        !self.intercept || NON_REFRESHABLE_PATHS.iter().any(|p| self.path.contains(p))
    }
}
