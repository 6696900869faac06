use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use tracing::debug;

/// Where a redirect sends the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// The sign-in view, optionally remembering where to go afterwards.
    Login { redirect: Option<String> },
    /// Default landing view for signed-in users.
    Dashboard,
    Path(String),
}

impl Location {
    pub const LOGIN_PATH: &'static str = "/login";
    pub const DASHBOARD_PATH: &'static str = "/dashboard";

    /// Login view that returns to `path` afterwards. Paths that are
    /// themselves the login view are not remembered.
    pub fn login_returning_to(path: Option<&str>) -> Self {
        let redirect = path
            .filter(|p| !p.is_empty() && !p.starts_with(Self::LOGIN_PATH))
            .map(str::to_string);
        Location::Login { redirect }
    }

    pub fn to_path(&self) -> String {
        match self {
            Location::Login { redirect: Some(target) } => {
                format!("{}?redirect={}", Self::LOGIN_PATH, urlencoding::encode(target))
            }
            Location::Login { redirect: None } => Self::LOGIN_PATH.to_string(),
            Location::Dashboard => Self::DASHBOARD_PATH.to_string(),
            Location::Path(path) => path.clone(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path())
    }
}

/// The view layer, as seen from the session core.
pub trait Navigator: Send + Sync {
    /// Path currently shown, if any.
    fn current_path(&self) -> Option<String>;
    fn navigate(&self, to: Location);
    fn set_title(&self, title: &str);
}

/// Navigations kept by `HistoryNavigator`; older entries are dropped.
pub const MAX_HISTORY: usize = 50;

#[derive(Debug, Default)]
struct HistoryInner {
    entries: VecDeque<String>,
    title: Option<String>,
}

/// Navigator that only records where it was sent. Front ends without a
/// real view stack (the CLI, tests) use it to observe redirects.
#[derive(Debug, Default)]
pub struct HistoryNavigator {
    inner: Mutex<HistoryInner>,
}

impl HistoryNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start at `path`, as if the user had opened it.
    pub fn starting_at(path: &str) -> Self {
        let navigator = Self::default();
        navigator.navigate(Location::Path(path.to_string()));
        navigator
    }

    pub fn history(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|inner| inner.entries.iter().cloned().collect::<Vec<_>>())
            .unwrap_or_default()
    }

    pub fn title(&self) -> Option<String> {
        self.inner.lock().ok().and_then(|inner| inner.title.clone())
    }

    /// True if the latest navigation went to the login view.
    pub fn at_login(&self) -> bool {
        self.current_path()
            .map(|p| p.starts_with(Location::LOGIN_PATH))
            .unwrap_or(false)
    }
}

impl Navigator for HistoryNavigator {
    fn current_path(&self) -> Option<String> {
        self.inner.lock().ok().and_then(|inner| inner.entries.back().cloned())
    }

    fn navigate(&self, to: Location) {
        let path = to.to_path();
        debug!(path = %path, "Navigate");
        if let Ok(mut inner) = self.inner.lock() {
            if inner.entries.len() == MAX_HISTORY {
                inner.entries.pop_front();
            }
            inner.entries.push_back(path);
        }
    }

    fn set_title(&self, title: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.title = Some(title.to_string());
        }
    }
}
