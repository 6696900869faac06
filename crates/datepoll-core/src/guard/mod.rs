//! Route-level access control.
//!
//! - `RouteTable`/`RouteMeta`: the application's routes and their
//!   `requires_auth` / `guest_only` annotations
//! - `AccessGuard`: pre-navigation check that redirects based on the session
//! - `Navigator`: the view layer the guard and the request pipeline redirect

pub mod access;
pub mod navigator;
pub mod routes;

pub use access::{evaluate, page_title, AccessGuard, GuardDecision, GuardOutcome, DEFAULT_APP_NAME};
pub use navigator::{HistoryNavigator, Location, Navigator};
pub use routes::{RouteMeta, RouteTable};
