use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

use super::CredentialStore;
use crate::models::{AuthResponse, User};

/// In-memory view of the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionData {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<User>,
    pub loading: bool,
}

impl SessionData {
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some() && self.user.is_some()
    }
}

struct Inner {
    data: SessionData,
    store: CredentialStore,
}

/// Authoritative session for the process.
///
/// Every mutation writes the credential store first and then updates the
/// in-memory data, both under one lock, so a reader never observes state
/// that has not been handed to the store. Store failures are logged and do
/// not block the mutation.
pub struct SessionState {
    inner: Mutex<Inner>,
}

impl SessionState {
    /// Create an empty session over `store`. Nothing is read until
    /// `hydrate` is called.
    pub fn new(store: CredentialStore) -> Self {
        Self {
            inner: Mutex::new(Inner {
                data: SessionData::default(),
                store,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Nothing panics while holding the lock, but a poisoned session is
        // still usable data.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adopt whatever a previous run persisted. Returns the access token if
    /// one was found.
    pub fn hydrate(&self) -> Option<String> {
        let mut inner = self.lock();
        let token = read_or_warn(inner.store.token(), "token");
        let Some(token) = token else {
            debug!("No persisted token");
            return None;
        };
        let refresh_token = read_or_warn(inner.store.refresh_token(), "refresh token");
        let user = read_or_warn(inner.store.user(), "user");
        debug!(has_refresh = refresh_token.is_some(), has_user = user.is_some(), "Session hydrated");

        inner.data.access_token = Some(token.clone());
        inner.data.refresh_token = refresh_token;
        inner.data.user = user;
        Some(token)
    }

    /// Install the result of login, register or refresh. A response without
    /// a rotated refresh credential keeps the current one.
    pub fn establish(&self, auth: &AuthResponse) {
        let mut inner = self.lock();
        let refresh_token = auth
            .refresh_token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| inner.data.refresh_token.clone());

        persist(inner.store.save_token(&auth.token), "token");
        if let Some(ref refresh_token) = refresh_token {
            persist(inner.store.save_refresh_token(refresh_token), "refresh token");
        }
        persist(inner.store.save_user(&auth.user), "user");

        inner.data.access_token = Some(auth.token.clone());
        inner.data.refresh_token = refresh_token;
        inner.data.user = Some(auth.user.clone());
    }

    /// Take an access token delivered without a profile (third-party
    /// sign-in callback). Whatever refresh credential and user belonged to
    /// the previous token are dropped; the session stays unauthenticated
    /// until a user is set.
    pub fn adopt_token(&self, token: &str) {
        let mut inner = self.lock();
        persist(inner.store.clear(), "session");
        persist(inner.store.save_token(token), "token");
        inner.data.access_token = Some(token.to_string());
        inner.data.refresh_token = None;
        inner.data.user = None;
    }

    pub fn set_user(&self, user: User) {
        let mut inner = self.lock();
        persist(inner.store.save_user(&user), "user");
        inner.data.user = Some(user);
    }

    /// Merge an accepted profile edit into the current user. Returns the
    /// merged user, or `None` when there is no user to edit.
    pub fn merge_profile(&self, name: &str, email: &str) -> Option<User> {
        let mut inner = self.lock();
        let merged = inner.data.user.as_ref()?.with_profile(name, email);
        persist(inner.store.save_user(&merged), "user");
        inner.data.user = Some(merged.clone());
        Some(merged)
    }

    /// Forget everything, in memory and in the store. Safe to repeat.
    pub fn clear(&self) {
        let mut inner = self.lock();
        persist(inner.store.clear(), "session");
        inner.data.access_token = None;
        inner.data.refresh_token = None;
        inner.data.user = None;
    }

    pub fn set_loading(&self, loading: bool) {
        self.lock().data.loading = loading;
    }

    /// Mark the session busy until the returned guard is dropped.
    pub fn begin_loading(&self) -> LoadingGuard<'_> {
        self.set_loading(true);
        LoadingGuard { session: self }
    }

    pub fn snapshot(&self) -> SessionData {
        self.lock().data.clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.lock().data.access_token.clone()
    }

    /// The refresh credential as currently persisted, or the in-memory copy
    /// when the store has none.
    pub fn refresh_token(&self) -> Option<String> {
        let inner = self.lock();
        match inner.store.refresh_token() {
            Ok(token) => token.or_else(|| inner.data.refresh_token.clone()),
            Err(e) => {
                warn!(error = %e, "Failed to read refresh token, using in-memory copy");
                inner.data.refresh_token.clone()
            }
        }
    }

    pub fn user(&self) -> Option<User> {
        self.lock().data.user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().data.is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().data.loading
    }
}

/// Clears the loading flag on drop.
pub struct LoadingGuard<'a> {
    session: &'a SessionState,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.session.set_loading(false);
    }
}

fn persist(result: anyhow::Result<()>, what: &str) {
    if let Err(e) = result {
        warn!(error = %e, "Failed to persist {}", what);
    }
}

fn read_or_warn<T>(result: anyhow::Result<Option<T>>, what: &str) -> Option<T> {
    result.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to read persisted {}", what);
        None
    })
}
