//! # Observability
//!
//! Centralized logging setup for OxiNews services.
//!
//! Services call `observability::init_with_config()` once at startup and use
//! the standard `tracing` macros everywhere else. Where the log lines end up
//! (a JSONL file, stderr, both) is decided here and nowhere else.
//!
//! ## File sink
//!
//! When enabled, every event is appended as one JSON object per line to
//! `~/.oxinews/logs/dev.jsonl` (or `LogConfig::log_path`):
//!
//! - `tail -f ~/.oxinews/logs/dev.jsonl | jq` for pretty JSON
//! - `lnav ~/.oxinews/logs/dev.jsonl` for interactive exploration
//!
//! Fields whose names look like credentials (`password`, `access_token`,
//! `refresh_token`, ...) are redacted before they reach the file.
//!
//! ## Usage
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "oxinews-cli".into(),
//!         default_level: "debug".into(),
//!         also_stderr: true,
//!         ..Default::default()
//!     });
//!
//!     tracing::info!("service started");
//! }
//! ```

mod json_layer;
mod sink;

use std::path::PathBuf;

pub use json_layer::{redact_value, LogEntry};
pub use sink::{default_log_path, CentralLogWriter};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service (e.g., "oxinews-cli").
    /// Included in every JSON log line for filtering.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// Optional custom log file path.
    /// Defaults to `~/.oxinews/logs/dev.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Write structured JSONL to the log file.
    pub file_output: bool,

    /// Also emit compact human-readable logs to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            file_output: true,
            also_stderr: false,
        }
    }
}

/// Initialize logging with default settings for the given service.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize logging with custom configuration.
///
/// Installing a global subscriber twice is a no-op, so tests and binaries may
/// both call this without coordination. If the log file cannot be opened the
/// file sink is skipped and a warning is logged to whatever sink remains.
pub fn init_with_config(config: LogConfig) {
    sink::init_subscriber(&config);
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;
