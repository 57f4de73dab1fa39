//! Route constants, route classification and the request-time route guard.

use crate::expiry::is_session_expired;
use crate::Session;
use chrono::{DateTime, Utc};
use serde::Serialize;
use url::form_urlencoded;

pub const HOME_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";
pub const SIGNUP_PATH: &str = "/signup";
pub const DASHBOARD_PATH: &str = "/dashboard";
pub const AUTH_CALLBACK_PATH: &str = "/auth/callback";
/// Every route under this prefix belongs to an auth flow.
pub const AUTH_PREFIX: &str = "/auth/";

/// Query parameter carrying the page a visitor was bounced from.
pub const REDIRECTED_FROM_PARAM: &str = "redirectedFrom";

/// Path component of `path` with any query string or fragment removed.
fn route_of(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    &path[..end]
}

/// Returns true for the login and signup pages.
pub fn is_login_or_signup(path: &str) -> bool {
    matches!(route_of(path), LOGIN_PATH | SIGNUP_PATH)
}

/// Returns true for login, signup and anything under `/auth/`.
pub fn is_auth_route(path: &str) -> bool {
    is_login_or_signup(path) || route_of(path).starts_with(AUTH_PREFIX)
}

/// Login URL that sends the visitor back to `from` afterwards.
pub fn login_redirect_url(from: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(from.as_bytes()).collect();
    format!("{}?{}={}", LOGIN_PATH, REDIRECTED_FROM_PARAM, encoded)
}

/// Outcome of a route guard check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GuardDecision {
    Allow,
    RedirectToLogin { redirected_from: String },
    RedirectToDashboard,
}

impl GuardDecision {
    /// Redirect target, `None` when the request may proceed.
    pub fn location(&self) -> Option<String> {
        match self {
            GuardDecision::Allow => None,
            GuardDecision::RedirectToLogin { redirected_from } => {
                Some(login_redirect_url(redirected_from))
            }
            GuardDecision::RedirectToDashboard => Some(DASHBOARD_PATH.to_string()),
        }
    }
}

/// Request-time access rules.
///
/// Static assets always pass. Anonymous visitors may only reach public
/// routes. Signed-in visitors are sent from the landing, login and signup
/// pages to the dashboard.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    public_routes: Vec<String>,
    public_prefixes: Vec<String>,
    static_prefixes: Vec<String>,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self {
            public_routes: [
                HOME_PATH,
                LOGIN_PATH,
                SIGNUP_PATH,
                "/forgot-password",
                "/reset-password",
                AUTH_CALLBACK_PATH,
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            public_prefixes: vec!["/api".to_string()],
            static_prefixes: ["/_next/static", "/_next/image", "/favicon.ico", "/public"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl RouteGuard {
    pub fn is_static(&self, path: &str) -> bool {
        let route = route_of(path);
        self.static_prefixes.iter().any(|p| route.starts_with(p.as_str()))
    }

    pub fn is_public(&self, path: &str) -> bool {
        let route = route_of(path);
        self.public_routes.iter().any(|r| r == route)
            || self.public_prefixes.iter().any(|p| route.starts_with(p.as_str()))
    }

    /// Decide what a request for `path` may do given the visitor's session.
    ///
    /// An expired session is treated as no session.
    pub fn evaluate(
        &self,
        path: &str,
        session: Option<&Session>,
        now: DateTime<Utc>,
    ) -> GuardDecision {
        if self.is_static(path) {
            return GuardDecision::Allow;
        }

        let signed_in = session.is_some() && !is_session_expired(session, now);
        if !signed_in {
            if self.is_public(path) {
                return GuardDecision::Allow;
            }
            return GuardDecision::RedirectToLogin {
                redirected_from: route_of(path).to_string(),
            };
        }

        if is_login_or_signup(path) || route_of(path) == HOME_PATH {
            return GuardDecision::RedirectToDashboard;
        }
        GuardDecision::Allow
    }

    /// Decision when the session could not be read at all.
    pub fn evaluate_lookup_error(&self, path: &str) -> GuardDecision {
        if self.is_static(path) {
            return GuardDecision::Allow;
        }
        GuardDecision::RedirectToLogin {
            redirected_from: route_of(path).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_expiring_in(secs: i64) -> Session {
        Session {
            access_token: "at".to_string(),
            refresh_token: "rt".to_string(),
            token_type: "bearer".to_string(),
            expires_in: Some(secs),
            expires_at: Some(Utc::now().timestamp() + secs),
            user: None,
        }
    }

    #[test]
    fn test_route_classification() {
        assert!(is_login_or_signup("/login"));
        assert!(is_login_or_signup("/signup?ref=newsletter"));
        assert!(!is_login_or_signup("/dashboard"));

        assert!(is_auth_route("/login"));
        assert!(is_auth_route("/auth/callback"));
        assert!(is_auth_route("/auth/confirm?token=x"));
        assert!(!is_auth_route("/authors"));
        assert!(!is_auth_route("/dashboard"));
    }

    #[test]
    fn test_login_redirect_url_encodes_origin() {
        assert_eq!(
            login_redirect_url("/dashboard"),
            "/login?redirectedFrom=%2Fdashboard"
        );
        assert_eq!(
            login_redirect_url("/feeds?tag=rust&page=2"),
            "/login?redirectedFrom=%2Ffeeds%3Ftag%3Drust%26page%3D2"
        );
    }

    #[test]
    fn test_static_assets_always_pass() {
        let guard = RouteGuard::default();
        assert_eq!(
            guard.evaluate("/_next/static/chunk.js", None, Utc::now()),
            GuardDecision::Allow
        );
        assert_eq!(
            guard.evaluate_lookup_error("/favicon.ico"),
            GuardDecision::Allow
        );
    }

    #[test]
    fn test_anonymous_visitor() {
        let guard = RouteGuard::default();
        let now = Utc::now();

        assert_eq!(guard.evaluate("/", None, now), GuardDecision::Allow);
        assert_eq!(guard.evaluate("/login", None, now), GuardDecision::Allow);
        assert_eq!(guard.evaluate("/api/feeds", None, now), GuardDecision::Allow);
        assert_eq!(
            guard.evaluate("/dashboard", None, now),
            GuardDecision::RedirectToLogin {
                redirected_from: "/dashboard".to_string()
            }
        );
    }

    #[test]
    fn test_signed_in_visitor() {
        let guard = RouteGuard::default();
        let session = session_expiring_in(3600);
        let now = Utc::now();

        assert_eq!(
            guard.evaluate("/login", Some(&session), now),
            GuardDecision::RedirectToDashboard
        );
        assert_eq!(
            guard.evaluate("/", Some(&session), now),
            GuardDecision::RedirectToDashboard
        );
        assert_eq!(
            guard.evaluate("/dashboard", Some(&session), now),
            GuardDecision::Allow
        );
        assert_eq!(
            guard.evaluate("/forgot-password", Some(&session), now),
            GuardDecision::Allow
        );
    }

    #[test]
    fn test_expired_session_is_anonymous() {
        let guard = RouteGuard::default();
        let session = session_expiring_in(-10);
        let now = Utc::now();

        assert_eq!(
            guard.evaluate("/settings", Some(&session), now),
            GuardDecision::RedirectToLogin {
                redirected_from: "/settings".to_string()
            }
        );
        assert_eq!(
            guard.evaluate("/login", Some(&session), now),
            GuardDecision::Allow
        );
    }

    #[test]
    fn test_redirect_origin_drops_query() {
        let guard = RouteGuard::default();
        assert_eq!(
            guard.evaluate("/feeds?tag=rust&page=2", None, Utc::now()),
            GuardDecision::RedirectToLogin {
                redirected_from: "/feeds".to_string()
            }
        );
        assert_eq!(
            guard.evaluate_lookup_error("/settings#billing").location().as_deref(),
            Some("/login?redirectedFrom=%2Fsettings")
        );
    }

    #[test]
    fn test_lookup_error_redirects_to_login() {
        let guard = RouteGuard::default();
        let decision = guard.evaluate_lookup_error("/dashboard");
        assert_eq!(
            decision.location().as_deref(),
            Some("/login?redirectedFrom=%2Fdashboard")
        );
    }

    #[test]
    fn test_decision_json_shape() {
        let json = serde_json::to_value(GuardDecision::RedirectToDashboard).unwrap();
        assert_eq!(json["decision"], "redirect_to_dashboard");
    }
}
