//! Structured Logging Configuration
//!
//! Provides configurable logging with:
//! - JSON output for production (LOG_FORMAT=json)
//! - Human-readable output for development (default)
//! - Session context via spans (session_id, username)
//!
//! # Usage
//!
//! ```rust,ignore
//! use pt_common::logging::init_logging;
//!
//! fn main() {
//!     init_logging("pt-dev");
//!
//!     tracing::info!(username = %name, "Session established");
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `LOG_FORMAT`: Set to "json" for JSON output, anything else for text (default: text)
//! - `RUST_LOG`: Standard log level filter (default: info)
//!   Examples: `RUST_LOG=debug`, `RUST_LOG=pt_session=trace,pt_shell=info`

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Parse a format name; anything other than "json" is text.
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }

    /// Read the format from `LOG_FORMAT`.
    pub fn from_env() -> Self {
        Self::parse(&std::env::var("LOG_FORMAT").unwrap_or_default())
    }
}

/// Initialize logging with the given service name.
///
/// Reads LOG_FORMAT to pick the output format and RUST_LOG for filtering
/// (defaults to INFO).
pub fn init_logging(service_name: &str) {
    init_logging_with_format(service_name, LogFormat::from_env());
}

/// Initialize logging with an explicit format (e.g. taken from configuration).
pub fn init_logging_with_format(service_name: &str, format: LogFormat) {
    let env_filter = default_filter();

    match format {
        LogFormat::Json => init_json_logging(env_filter),
        LogFormat::Text => init_text_logging(env_filter),
    }

    tracing::debug!(service = service_name, ?format, "Logging initialized");
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize JSON logging for production.
fn init_json_logging(env_filter: EnvFilter) {
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .flatten_event(true)
                .with_span_events(FmtSpan::CLOSE),
        )
        .try_init();
}

/// Initialize human-readable text logging for development.
fn init_text_logging(env_filter: EnvFilter) {
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(true),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("text"), LogFormat::Text);
        assert_eq!(LogFormat::parse(""), LogFormat::Text);
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        init_logging_with_format("test", LogFormat::Text);
        init_logging_with_format("test", LogFormat::Json);
    }
}
