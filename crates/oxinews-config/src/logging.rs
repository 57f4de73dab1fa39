//! Logging initialization.
//!
//! Thin wrapper over the observability crate so every OxiNews binary sets up
//! tracing the same way: structured JSONL under `~/.oxinews/logs/dev.jsonl`
//! plus optional compact stderr output.

use crate::Paths;
use observability::LogConfig;

/// Initialize logging for the default `oxinews` service.
///
/// # Example
///
/// ```ignore
/// init_logging("info", &paths, true);
/// tracing::info!("started");
/// ```
pub fn init_logging(level: &str, paths: &Paths, also_stderr: bool) {
    init_logging_for_service("oxinews", level, paths, also_stderr);
}

/// Initialize logging with a custom service name.
///
/// Set `OXINEWS_LOG_FILE=0` to disable the JSONL file sink.
pub fn init_logging_for_service(service_name: &str, level: &str, paths: &Paths, also_stderr: bool) {
    let file_output = !matches!(
        std::env::var("OXINEWS_LOG_FILE")
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
            .as_str(),
        "0" | "false" | "off"
    );

    observability::init_with_config(LogConfig {
        service_name: service_name.into(),
        default_level: parse_level(level).to_string().to_ascii_lowercase(),
        log_path: Some(paths.log_file()),
        file_output,
        also_stderr,
    });
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_level_all_variants() {
        assert_eq!(parse_level("trace"), tracing::Level::TRACE);
        assert_eq!(parse_level("debug"), tracing::Level::DEBUG);
        assert_eq!(parse_level("info"), tracing::Level::INFO);
        assert_eq!(parse_level("warn"), tracing::Level::WARN);
        assert_eq!(parse_level("warning"), tracing::Level::WARN);
        assert_eq!(parse_level("error"), tracing::Level::ERROR);
    }

    #[test]
    fn parse_level_case_insensitive() {
        assert_eq!(parse_level("TRACE"), tracing::Level::TRACE);
        assert_eq!(parse_level("Debug"), tracing::Level::DEBUG);
        assert_eq!(parse_level("WARNING"), tracing::Level::WARN);
    }

    #[test]
    fn parse_level_unknown_defaults_to_info() {
        assert_eq!(parse_level(""), tracing::Level::INFO);
        assert_eq!(parse_level("verbose"), tracing::Level::INFO);
        assert_eq!(parse_level("fatal"), tracing::Level::INFO);
    }

    #[test]
    fn parsed_level_renders_as_filter_directive() {
        assert_eq!(parse_level("WARNING").to_string().to_ascii_lowercase(), "warn");
    }
}
