//! Authentication module: session state and its lifecycle.
//!
//! This module provides:
//! - `CredentialStore`: durable key/value mirror of the session (file,
//!   OS keychain, or in-memory backend)
//! - `SessionState`: the in-memory session, persisted on every mutation
//! - `RefreshProtocol`: single-flight renewal of an expired access token
//! - `AuthService`: login, registration, logout, profile and hydration

pub mod credentials;
pub mod refresh;
pub mod service;
pub mod session;

pub use credentials::{CredentialBackend, CredentialStore, FileBackend, KeyringBackend, MemoryBackend};
pub use refresh::{RefreshProtocol, RefreshState};
pub use service::AuthService;
pub use session::{LoadingGuard, SessionData, SessionState};
