use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::SessionState;
use crate::api::client::{
    LOGIN_PATH, LOGOUT_PATH, ME_PATH, OAUTH_LOGIN_PATH, PASSWORD_PATH, PROFILE_PATH, REGISTER_PATH,
};
use crate::api::{ApiClient, ApiRequest, AuthError};
use crate::models::{
    AuthResponse, ChangePasswordRequest, LoginRequest, RegisterRequest, UpdateProfileRequest, User,
};

/// Best-effort server-side logout followed by unconditional local teardown.
/// Idempotent; safe to call from several failure paths.
pub(crate) async fn end_session(api: &ApiClient) {
    let session = api.session();
    let token = session.access_token();
    let refresh_token = session.refresh_token();

    if token.is_some() || refresh_token.is_some() {
        let mut request = ApiRequest::post(LOGOUT_PATH);
        if let Some(ref refresh_token) = refresh_token {
            request = request.refresh_cookie(refresh_token);
        }
        let result = match api.execute(&request, token.as_deref()).await {
            Ok(response) => ApiClient::check_response(response).await.map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(error = %e, "Logout error");
        }
    } else {
        debug!("No credentials held, skipping server logout");
    }

    session.clear();
    info!("Session ended");
}

/// Session operations: sign in, sign out, and keep the session valid.
/// Clone is cheap and shares the same session.
#[derive(Clone)]
pub struct AuthService {
    api: ApiClient,
}

impl AuthService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn session(&self) -> &SessionState {
        self.api.session()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_authenticated()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, AuthError> {
        let _loading = self.session().begin_loading();
        let request = ApiRequest::post(LOGIN_PATH)
            .without_refresh()
            .json(&LoginRequest { email, password })?;

        let auth: AuthResponse = self
            .api
            .send_json(request)
            .await
            .map_err(AuthError::from_credential_check)?;

        self.session().establish(&auth);
        info!(user_id = %auth.user.id, "Logged in");
        Ok(auth)
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<AuthResponse, AuthError> {
        let _loading = self.session().begin_loading();
        let request = ApiRequest::post(REGISTER_PATH)
            .without_refresh()
            .json(&RegisterRequest { name, email, password })?;

        let auth: AuthResponse = self
            .api
            .send_json(request)
            .await
            .map_err(AuthError::from_credential_check)?;

        self.session().establish(&auth);
        info!(user_id = %auth.user.id, "Registered");
        Ok(auth)
    }

    /// Never fails: the local session is cleared whatever the server says.
    pub async fn logout(&self) {
        end_session(&self.api).await;
    }

    /// Validate the held token by loading the profile. Any failure signs
    /// the session out. No-op without a token.
    pub async fn fetch_current_user(&self) {
        if self.session().access_token().is_none() {
            return;
        }

        match self.api.get::<User>(ME_PATH).await {
            Ok(user) => {
                debug!(user_id = %user.id, "Current user loaded");
                self.session().set_user(user);
            }
            Err(e) => {
                warn!(error = %e, "Failed to load current user, signing out");
                self.logout().await;
            }
        }
    }

    /// Renew the access token now. Returns whether the session survived.
    pub async fn refresh_session(&self) -> bool {
        self.api.refresh_protocol().renew(&self.api).await
    }

    /// Resume a session persisted by a previous run. If a token was found,
    /// it is validated in the background; the returned handle resolves once
    /// that check has finished. Must be called inside a tokio runtime.
    pub fn hydrate_from_store(&self) -> Option<JoinHandle<()>> {
        self.session().hydrate()?;
        let service = self.clone();
        Some(tokio::spawn(async move {
            service.fetch_current_user().await;
        }))
    }

    /// Save a new name and email. The stored profile is merged with the
    /// submitted fields once the server accepts them.
    pub async fn update_profile(&self, name: &str, email: &str) -> Result<User, AuthError> {
        let _: serde_json::Value = self
            .api
            .put(PROFILE_PATH, &UpdateProfileRequest { name, email })
            .await?;

        self.session()
            .merge_profile(name, email)
            .ok_or(AuthError::Unauthorized)
    }

    pub async fn change_password(&self, old_password: &str, new_password: &str) -> Result<(), AuthError> {
        let request = ApiRequest::put(PASSWORD_PATH)
            .without_refresh()
            .json(&ChangePasswordRequest {
                old_password,
                new_password,
            })?;

        self.api
            .send(request)
            .await
            .map_err(AuthError::from_credential_check)?;
        info!("Password changed");
        Ok(())
    }

    /// Address that starts third-party sign-in in a browser.
    pub fn oauth_login_url(&self) -> String {
        self.api.url(OAUTH_LOGIN_PATH)
    }

    /// Finish third-party sign-in with the access token handed to the
    /// callback view.
    pub async fn complete_oauth_login(&self, token: &str) -> Result<User, AuthError> {
        self.session().adopt_token(token);
        self.fetch_current_user().await;

        match self.session().user() {
            Some(user) if self.session().is_authenticated() => Ok(user),
            _ => Err(AuthError::SessionExpired),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{auth_body, Harness};
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn test_login_then_401_scenario() {
        let mut server = Server::new_async().await;
        let login = server
            .mock("POST", "/api/auth/login")
            .match_body(Matcher::Json(json!({"email": "a@b.com", "password": "pw"})))
            .with_status(200)
            .with_body(auth_body("T1", "R1"))
            .expect(1)
            .create_async()
            .await;

        let h = Harness::new(&server.url());
        let auth = h.ctx.auth.login("a@b.com", "pw").await.expect("login");

        assert_eq!(auth.token, "T1");
        assert!(h.ctx.auth.is_authenticated());
        assert!(!h.ctx.session.is_loading());
        assert_eq!(h.stored("token").as_deref(), Some("T1"));
        login.assert_async().await;

        server
            .mock("GET", "/api/polls")
            .match_header("authorization", "Bearer T1")
            .with_status(401)
            .create_async()
            .await;
        server
            .mock("POST", "/api/auth/refresh")
            .with_status(200)
            .with_body(auth_body("T2", "R2"))
            .expect(1)
            .create_async()
            .await;
        let replay = server
            .mock("GET", "/api/polls")
            .match_header("authorization", "Bearer T2")
            .with_status(200)
            .with_body(r#"{"polls":[],"count":0}"#)
            .expect(1)
            .create_async()
            .await;

        let _: serde_json::Value = h.ctx.api.get("/api/polls").await.expect("replayed");
        assert_eq!(h.stored("token").as_deref(), Some("T2"));
        replay.assert_async().await;
    }

    #[tokio::test]
    async fn test_login_rejected_is_invalid_credentials() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/auth/login")
            .with_status(401)
            .with_body(r#"{"error":"Invalid credentials"}"#)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/api/auth/refresh")
            .expect(0)
            .create_async()
            .await;

        let h = Harness::new(&server.url());
        let err = h.ctx.auth.login("a@b.com", "bad").await.expect_err("rejected");

        assert!(matches!(err, AuthError::InvalidCredentials));
        assert!(!h.ctx.session.is_loading());
        assert!(!h.navigator.at_login());
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_login_network_failure() {
        let h = Harness::new("http://127.0.0.1:1");
        let err = h.ctx.auth.login("a@b.com", "pw").await.expect_err("unreachable");
        assert!(matches!(err, AuthError::NetworkFailure(_)));
        assert!(!h.ctx.auth.is_authenticated());
    }

    #[tokio::test]
    async fn test_login_timeout_is_network_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let url = format!("http://{}", listener.local_addr().expect("addr"));

        let h = Harness::with_timeout_secs(&url, 1);
        let err = h.ctx.auth.login("a@b.com", "pw").await.expect_err("timed out");
        assert!(matches!(err, AuthError::NetworkFailure(_)));
        assert!(!h.ctx.session.is_loading());
        drop(listener);
    }

    #[tokio::test]
    async fn test_register_conflict_is_rejected() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/auth/register")
            .match_body(Matcher::Json(json!({"name": "A", "email": "a@b.com", "password": "secret123"})))
            .with_status(409)
            .with_body(r#"{"error":"Email already registered"}"#)
            .create_async()
            .await;

        let h = Harness::new(&server.url());
        let err = h
            .ctx
            .auth
            .register("A", "a@b.com", "secret123")
            .await
            .expect_err("conflict");
        assert!(matches!(err, AuthError::Rejected(ref msg) if msg == "Email already registered"));
    }

    #[tokio::test]
    async fn test_register_establishes_session() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/auth/register")
            .with_status(201)
            .with_body(auth_body("T1", "R1"))
            .create_async()
            .await;

        let h = Harness::new(&server.url());
        h.ctx.auth.register("A", "a@b.com", "secret123").await.expect("register");
        assert!(h.ctx.auth.is_authenticated());
        assert_eq!(h.stored("refresh_token").as_deref(), Some("R1"));
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_server_fails() {
        let mut server = Server::new_async().await;
        let logout = server
            .mock("POST", "/api/auth/logout")
            .match_header("authorization", "Bearer T1")
            .match_header("cookie", "refresh_token=R1")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;

        let h = Harness::new(&server.url());
        h.sign_in("T1", "R1");

        h.ctx.auth.logout().await;
        let once = h.ctx.session.snapshot();
        h.ctx.auth.logout().await;

        assert_eq!(h.ctx.session.snapshot(), once);
        assert!(!h.ctx.auth.is_authenticated());
        assert!(h.backend.is_empty());
        // The second logout had nothing to invalidate
        logout.assert_async().await;
    }

    #[tokio::test]
    async fn test_logout_without_network() {
        let h = Harness::new("http://127.0.0.1:1");
        h.sign_in("T1", "R1");
        h.ctx.auth.logout().await;
        assert!(!h.ctx.auth.is_authenticated());
        assert!(h.backend.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_current_user_without_token_is_noop() {
        let mut server = Server::new_async().await;
        let me = server.mock("GET", "/api/auth/me").expect(0).create_async().await;

        let h = Harness::new(&server.url());
        h.ctx.auth.fetch_current_user().await;
        me.assert_async().await;
    }

    #[tokio::test]
    async fn test_hydrate_validates_stored_token() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/auth/me")
            .match_header("authorization", "Bearer T1")
            .with_status(200)
            .with_body(r#"{"id":1,"name":"Ada","email":"a@b.com"}"#)
            .create_async()
            .await;

        let h = Harness::new(&server.url());
        h.backend_set("token", "T1");
        h.backend_set("refresh_token", "R1");

        let handle = h.ctx.auth.hydrate_from_store().expect("token found");
        assert_eq!(h.ctx.session.access_token().as_deref(), Some("T1"));
        handle.await.expect("validation task");

        let user = h.ctx.session.user().expect("user loaded");
        assert_eq!(user.name, "Ada");
        assert!(h.ctx.auth.is_authenticated());
        assert!(h.stored("user").is_some());
    }

    #[tokio::test]
    async fn test_hydrate_with_stale_token_self_heals() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/auth/me")
            .with_status(401)
            .create_async()
            .await;
        server
            .mock("POST", "/api/auth/refresh")
            .with_status(401)
            .create_async()
            .await;
        server
            .mock("POST", "/api/auth/logout")
            .with_status(200)
            .create_async()
            .await;

        let h = Harness::new(&server.url());
        h.backend_set("token", "T-old");
        h.backend_set("refresh_token", "R-old");
        h.backend_set("user", r#"{"id":1,"name":"A"}"#);

        let handle = h.ctx.auth.hydrate_from_store().expect("token found");
        handle.await.expect("validation task");

        assert!(!h.ctx.auth.is_authenticated());
        assert!(h.backend.is_empty());
    }

    #[tokio::test]
    async fn test_hydrate_without_stored_token() {
        let h = Harness::new("http://127.0.0.1:1");
        assert!(h.ctx.auth.hydrate_from_store().is_none());
    }

    #[tokio::test]
    async fn test_refresh_session_reports_outcome() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/auth/refresh")
            .with_status(200)
            .with_body(auth_body("T2", "R2"))
            .create_async()
            .await;

        let h = Harness::new(&server.url());
        h.sign_in("T1", "R1");
        assert!(h.ctx.auth.refresh_session().await);
        assert_eq!(h.ctx.session.access_token().as_deref(), Some("T2"));
    }

    #[tokio::test]
    async fn test_update_profile_merges_user() {
        let mut server = Server::new_async().await;
        server
            .mock("PUT", "/api/auth/profile")
            .match_body(Matcher::Json(json!({"name": "Ada", "email": "ada@b.com"})))
            .with_status(200)
            .with_body(r#"{"message":"Profile updated successfully"}"#)
            .create_async()
            .await;

        let h = Harness::new(&server.url());
        h.sign_in("T1", "R1");
        let user = h.ctx.auth.update_profile("Ada", "ada@b.com").await.expect("update");

        assert_eq!(user.name, "Ada");
        assert_eq!(h.ctx.session.user().map(|u| u.email), Some("ada@b.com".to_string()));
        assert!(h.stored("user").expect("user").contains("ada@b.com"));
    }

    #[tokio::test]
    async fn test_change_password_wrong_old_password() {
        let mut server = Server::new_async().await;
        server
            .mock("PUT", "/api/auth/password")
            .match_body(Matcher::Json(json!({"old_password": "old", "new_password": "newsecret"})))
            .with_status(401)
            .with_body(r#"{"error":"Invalid current password"}"#)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/api/auth/refresh")
            .expect(0)
            .create_async()
            .await;

        let h = Harness::new(&server.url());
        h.sign_in("T1", "R1");
        let err = h
            .ctx
            .auth
            .change_password("old", "newsecret")
            .await
            .expect_err("wrong password");

        assert!(matches!(err, AuthError::InvalidCredentials));
        assert!(h.ctx.auth.is_authenticated());
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_oauth_callback_adopts_token() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/auth/me")
            .match_header("authorization", "Bearer G1")
            .with_status(200)
            .with_body(r#"{"id":"u-1","name":"G","email":"g@b.com","provider":"google"}"#)
            .create_async()
            .await;

        let h = Harness::new(&server.url());
        assert_eq!(
            h.ctx.auth.oauth_login_url(),
            format!("{}/auth/google/login", server.url())
        );

        let user = h.ctx.auth.complete_oauth_login("G1").await.expect("oauth");
        assert_eq!(user.provider.as_deref(), Some("google"));
        assert_eq!(h.stored("token").as_deref(), Some("G1"));
    }

    #[tokio::test]
    async fn test_oauth_over_existing_session_replaces_account() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/auth/me")
            .match_header("authorization", "Bearer G1")
            .with_status(200)
            .with_body(r#"{"id":"u-2","name":"B","email":"b@b.com","provider":"google"}"#)
            .create_async()
            .await;

        let h = Harness::new(&server.url());
        h.sign_in("T1", "R1");

        let user = h.ctx.auth.complete_oauth_login("G1").await.expect("oauth");

        assert_eq!(user.email, "b@b.com");
        assert!(h.ctx.session.refresh_token().is_none());
        assert!(h.stored("refresh_token").is_none());
        assert!(h.stored("user").expect("user").contains("b@b.com"));
    }
}
