//! Session and credential lifecycle for the datepoll web client.
//!
//! The crate acquires, persists and attaches the authentication token to
//! every outbound API call, renews it transparently when the server rejects
//! it, and decides which views a visitor may open.
//!
//! - [`auth`]: credential store, session state, refresh protocol, session
//!   operations
//! - [`api`]: the request pipeline and error types
//! - [`guard`]: route table and access guard
//! - [`polls`]: poll endpoints built on the pipeline
//! - [`config`]: configuration file and environment overrides

pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod guard;
pub mod models;
pub mod polls;

pub use api::{ApiClient, ApiError, ApiRequest, AuthError};
pub use auth::{AuthService, CredentialStore, SessionState};
pub use config::Config;
pub use context::AppContext;
pub use guard::{AccessGuard, GuardDecision, HistoryNavigator, Location, Navigator};
pub use polls::PollsApi;

#[cfg(test)]
pub(crate) mod test_support;
