/// Access annotations and title declared on a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMeta {
    pub name: &'static str,
    /// Literal segments, `:param` segments, or `*` for the catch-all.
    pub pattern: &'static str,
    pub title: Option<&'static str>,
    pub requires_auth: bool,
    pub guest_only: bool,
}

impl RouteMeta {
    pub fn new(name: &'static str, pattern: &'static str, title: &'static str) -> Self {
        Self {
            name,
            pattern,
            title: Some(title),
            requires_auth: false,
            guest_only: false,
        }
    }

    pub fn auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    pub fn guest(mut self) -> Self {
        self.guest_only = true;
        self
    }

    /// Match a path (without query string) against this route's pattern.
    pub fn matches(&self, path: &str) -> bool {
        if self.pattern == "*" {
            return true;
        }
        let mut pattern = segments(self.pattern);
        let mut actual = segments(path);
        loop {
            match (pattern.next(), actual.next()) {
                (None, None) => return true,
                (Some(p), Some(_)) if p.starts_with(':') => continue,
                (Some(p), Some(a)) if p == a => continue,
                _ => return false,
            }
        }
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Strip the query string and fragment.
pub fn path_only(full_path: &str) -> &str {
    let end = full_path.find(|c: char| c == '?' || c == '#').unwrap_or(full_path.len());
    &full_path[..end]
}

/// Ordered route declarations; the first match wins.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<RouteMeta>,
}

impl RouteTable {
    pub fn new(routes: Vec<RouteMeta>) -> Self {
        Self { routes }
    }

    pub fn resolve(&self, full_path: &str) -> Option<&RouteMeta> {
        let path = path_only(full_path);
        self.routes.iter().find(|route| route.matches(path))
    }

    pub fn by_name(&self, name: &str) -> Option<&RouteMeta> {
        self.routes.iter().find(|route| route.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteMeta> {
        self.routes.iter()
    }
}

impl Default for RouteTable {
    /// The application's views.
    fn default() -> Self {
        Self::new(vec![
            RouteMeta::new("home", "/", "Home"),
            RouteMeta::new("login", "/login", "Login").guest(),
            RouteMeta::new("register", "/register", "Register").guest(),
            RouteMeta::new("create-poll", "/create", "Create Poll").auth(),
            RouteMeta::new("poll", "/poll/:id", "Poll Details"),
            RouteMeta::new("edit-poll", "/poll/:id/edit", "Edit Poll").auth(),
            RouteMeta::new("dashboard", "/dashboard", "Dashboard").auth(),
            RouteMeta::new("profile", "/profile", "Profile").auth(),
            RouteMeta::new("auth-callback", "/auth/callback", "Authentication"),
            RouteMeta::new("not-found", "*", "Not Found"),
        ])
    }
}
