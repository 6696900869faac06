use tracing::debug;

use super::navigator::{Location, Navigator};
use super::routes::{RouteMeta, RouteTable};
use crate::auth::SessionState;

/// Default application name used in page titles.
pub const DEFAULT_APP_NAME: &str = "Doodle Clone";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(Location),
}

/// Result of checking one navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardOutcome {
    pub title: String,
    pub decision: GuardDecision,
}

/// Page title for a route: `"<title> - <app>"`, or just the app name.
pub fn page_title(route: Option<&RouteMeta>, app_name: &str) -> String {
    match route.and_then(|r| r.title) {
        Some(title) => format!("{} - {}", title, app_name),
        None => app_name.to_string(),
    }
}

/// Decide whether navigating to `full_path` (route `route`) may proceed.
pub fn evaluate(
    route: Option<&RouteMeta>,
    full_path: &str,
    is_authenticated: bool,
    app_name: &str,
) -> GuardOutcome {
    let title = page_title(route, app_name);
    let decision = match route {
        Some(r) if r.requires_auth && !is_authenticated => {
            GuardDecision::Redirect(Location::login_returning_to(Some(full_path)))
        }
        Some(r) if r.guest_only && is_authenticated => GuardDecision::Redirect(Location::Dashboard),
        _ => GuardDecision::Allow,
    };
    GuardOutcome { title, decision }
}

/// Runs before every navigation, reading only whether the session is
/// authenticated.
#[derive(Debug, Clone)]
pub struct AccessGuard {
    routes: RouteTable,
    app_name: String,
}

impl AccessGuard {
    pub fn new(routes: RouteTable, app_name: impl Into<String>) -> Self {
        Self {
            routes,
            app_name: app_name.into(),
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn check(&self, full_path: &str, is_authenticated: bool) -> GuardOutcome {
        evaluate(
            self.routes.resolve(full_path),
            full_path,
            is_authenticated,
            &self.app_name,
        )
    }

    /// Check a navigation and apply it: set the title, then go to the
    /// requested path or to the redirect target.
    pub fn before_each(
        &self,
        full_path: &str,
        session: &SessionState,
        navigator: &dyn Navigator,
    ) -> GuardDecision {
        let outcome = self.check(full_path, session.is_authenticated());
        navigator.set_title(&outcome.title);
        match &outcome.decision {
            GuardDecision::Allow => navigator.navigate(Location::Path(full_path.to_string())),
            GuardDecision::Redirect(to) => {
                debug!(from = %full_path, to = %to, "Navigation redirected");
                navigator.navigate(to.clone());
            }
        }
        outcome.decision
    }
}

impl Default for AccessGuard {
    fn default() -> Self {
        Self::new(RouteTable::default(), DEFAULT_APP_NAME)
    }
}
