//! Deployment environment detection and absolute URL construction.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Path the auth provider redirects back to after an OAuth sign-in.
pub const OAUTH_CALLBACK_PATH: &str = "/auth/callback";

/// Base URL used for every link while developing locally.
const DEVELOPMENT_BASE_URL: &str = "http://localhost:3000";

/// Which deployment the process is running in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    /// Parse an environment name. Unknown names are treated as production.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" | "local" => Environment::Development,
            _ => Environment::Production,
        }
    }

    /// Detect the environment from an explicit name, falling back to the site URL.
    ///
    /// A site served from `localhost` is always development.
    pub fn detect(explicit: Option<&str>, site_url: &str) -> Self {
        if let Some(name) = explicit.filter(|n| !n.trim().is_empty()) {
            return Self::from_name(name);
        }

        let is_localhost = Url::parse(site_url)
            .ok()
            .and_then(|url| url.host_str().map(|h| h == "localhost" || h == "127.0.0.1"))
            .unwrap_or(false);

        if is_localhost {
            Environment::Development
        } else {
            Environment::Production
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    /// Base URL for links in this environment.
    pub fn base_url(&self, site_url: &str) -> String {
        match self {
            Environment::Development => DEVELOPMENT_BASE_URL.to_string(),
            Environment::Production => site_url.trim_end_matches('/').to_string(),
        }
    }

    /// Absolute URL for `path`, which may omit its leading slash.
    pub fn url_for(&self, site_url: &str, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url(site_url), path)
        } else {
            format!("{}/{}", self.base_url(site_url), path)
        }
    }

    /// Full OAuth callback URL.
    pub fn oauth_callback_url(&self, site_url: &str) -> String {
        self.url_for(site_url, OAUTH_CALLBACK_PATH)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}
