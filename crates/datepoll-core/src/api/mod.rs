//! REST API client module for the poll backend.
//!
//! This module provides the `ApiClient` request pipeline, which attaches the
//! session's bearer token to every call and recovers from an expired token
//! once per request.

pub mod client;
pub mod error;
pub mod request;

pub use client::{ApiClient, DEFAULT_BASE_URL, REQUEST_TIMEOUT_SECS};
pub use error::{ApiError, AuthError};
pub use request::ApiRequest;
