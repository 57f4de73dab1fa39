//! Configuration management.

use crate::{CoreError, CoreResult, Environment, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default Supabase URL (can be overridden at compile time via SUPABASE_URL env var).
pub const DEFAULT_SUPABASE_URL: &str = match option_env!("SUPABASE_URL") {
    Some(url) => url,
    None => "https://oxinews.supabase.co",
};

/// Default Supabase anon key (can be overridden at compile time via SUPABASE_ANON_KEY env var).
pub const DEFAULT_SUPABASE_ANON_KEY: &str = match option_env!("SUPABASE_ANON_KEY") {
    Some(key) => key,
    None => "anon-key",
};

/// Default public site URL (can be overridden at compile time via OXINEWS_SITE_URL env var).
pub const DEFAULT_SITE_URL: &str = match option_env!("OXINEWS_SITE_URL") {
    Some(url) => url,
    None => "https://oxinews.com",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Timeouts and delays used by the session controller, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// How long a session lock may be held before it is force-released.
    pub lock_timeout_ms: u64,
    /// How long startup may stay in `loading` before it is forced to `unauthenticated`.
    pub init_timeout_ms: u64,
    /// Length of one rendering frame.
    pub frame_interval_ms: u64,
    /// Extra settle time after a frame before navigating away on sign-out.
    pub settle_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 5_000,
            init_timeout_ms: 5_000,
            frame_interval_ms: 16,
            settle_delay_ms: 50,
        }
    }
}

impl TimingConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Supabase project URL.
    #[serde(default = "default_supabase_url")]
    pub supabase_url: String,
    /// Supabase anon API key (public, safe to expose).
    #[serde(default = "default_supabase_anon_key")]
    pub supabase_anon_key: String,
    /// Public URL of the web app, used to build OAuth redirect targets.
    #[serde(default = "default_site_url")]
    pub site_url: String,
    /// Deployment environment. Detected from `site_url` when absent.
    #[serde(default)]
    pub environment: Option<Environment>,
    /// Session controller timings.
    #[serde(default)]
    pub timing: TimingConfig,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_supabase_url() -> String {
    DEFAULT_SUPABASE_URL.to_string()
}

fn default_supabase_anon_key() -> String {
    DEFAULT_SUPABASE_ANON_KEY.to_string()
}

fn default_site_url() -> String {
    DEFAULT_SITE_URL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            supabase_url: default_supabase_url(),
            supabase_anon_key: default_supabase_anon_key(),
            site_url: default_site_url(),
            environment: None,
            timing: TimingConfig::default(),
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override configuration from environment variables.
    fn load_from_env(&mut self) {
        if let Some(log_level) = non_empty_env("OXINEWS_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Some(site_url) = non_empty_env("OXINEWS_SITE_URL") {
            self.site_url = site_url;
        }
        if let Some(env) = non_empty_env("OXINEWS_ENV") {
            self.environment = Some(Environment::from_name(&env));
        }
    }

    /// Check that URLs parse and timings are usable.
    pub fn validate(&self) -> CoreResult<()> {
        self.supabase_url()?;
        self.site_url()?;
        if self.timing.lock_timeout_ms == 0 {
            return Err(CoreError::Config(
                "timing.lock_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.timing.init_timeout_ms == 0 {
            return Err(CoreError::Config(
                "timing.init_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the Supabase URL as a parsed URL.
    pub fn supabase_url(&self) -> CoreResult<Url> {
        Url::parse(&self.supabase_url).map_err(CoreError::from)
    }

    /// Get the site URL as a parsed URL.
    pub fn site_url(&self) -> CoreResult<Url> {
        Url::parse(&self.site_url).map_err(CoreError::from)
    }

    /// Effective environment, detected from the site URL when not configured.
    pub fn environment(&self) -> Environment {
        self.environment
            .unwrap_or_else(|| Environment::detect(None, &self.site_url))
    }

    /// OAuth redirect target for the effective environment.
    pub fn oauth_callback_url(&self) -> String {
        self.environment().oauth_callback_url(&self.site_url)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}
