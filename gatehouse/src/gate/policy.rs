//! Route classification

/// Whether a route needs an authenticated principal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Reachable without authentication (still subject to the ban check)
    Public,
    /// Requires an authenticated session or approved address
    Protected,
}

/// Decides which paths bypass authentication
///
/// Everything not listed as public is protected, so a newly added route is
/// gated unless it is explicitly opened up here.
#[derive(Debug, Clone, Copy)]
pub struct RoutePolicy {
    stats_public: bool,
}

const PUBLIC_PATHS: [&str; 3] = ["/login", "/oauth-callback", "/status"];

impl RoutePolicy {
    /// Login, OAuth callback and status are public; `/stats` only if `stats_public`
    pub fn new(stats_public: bool) -> Self {
        Self { stats_public }
    }

    /// Classify a request path
    ///
    /// Matching is exact apart from one trailing slash.
    pub fn classify(&self, path: &str) -> RouteClass {
        let normalized = match path.strip_suffix('/') {
            Some(stripped) if !stripped.is_empty() => stripped,
            _ => path,
        };
        if PUBLIC_PATHS.contains(&normalized) || (self.stats_public && normalized == "/stats") {
            RouteClass::Public
        } else {
            RouteClass::Protected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_routes() {
        let policy = RoutePolicy::new(false);
        assert_eq!(policy.classify("/login"), RouteClass::Public);
        assert_eq!(policy.classify("/login/"), RouteClass::Public);
        assert_eq!(policy.classify("/oauth-callback"), RouteClass::Public);
        assert_eq!(policy.classify("/status"), RouteClass::Public);
    }

    #[test]
    fn test_everything_else_is_protected() {
        let policy = RoutePolicy::new(false);
        for path in ["/", "/files", "/files/a.txt", "/stats", "/logout", "/loginx", "/status/x"] {
            assert_eq!(policy.classify(path), RouteClass::Protected, "{}", path);
        }
    }

    #[test]
    fn test_stats_can_be_public() {
        assert_eq!(RoutePolicy::new(true).classify("/stats"), RouteClass::Public);
    }
}
