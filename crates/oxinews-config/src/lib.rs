//! Configuration, paths, and logging setup shared by OxiNews crates.

mod config;
pub mod environment;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, TimingConfig, DEFAULT_LOG_LEVEL, DEFAULT_SITE_URL, DEFAULT_SUPABASE_ANON_KEY,
    DEFAULT_SUPABASE_URL,
};
pub use environment::{Environment, OAUTH_CALLBACK_PATH};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, init_logging_for_service, parse_level};
pub use paths::Paths;
