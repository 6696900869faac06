//! Data models shared by the session core and its collaborators.
//!
//! - `User`, `UserId`: the authenticated profile kept in the session
//! - `AuthResponse`: token pair plus user returned by login/register/refresh
//! - `PollSummary`: minimal poll shape used by the polls collaborator

pub mod poll;
pub mod user;

pub use poll::{PollListResponse, PollSummary};
pub use user::{AuthResponse, User, UserId};

pub(crate) use poll::PollEnvelope;
pub(crate) use user::{ChangePasswordRequest, LoginRequest, RegisterRequest, UpdateProfileRequest};
