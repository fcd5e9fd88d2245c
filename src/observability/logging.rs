//! Structured logging settings.

use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Fallback filter directive.
pub const DEFAULT_LEVEL: &str = "info";

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name, defaulting to `Pretty`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }

    /// Returns the configuration name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

/// Logging section of the configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Filter directive, e.g. `info` or `chanwatch=debug,reqwest=warn`.
    pub level: Option<String>,
    /// Console format.
    pub format: LogFormat,
    /// Append-only log file, in addition to stderr.
    pub file: Option<PathBuf>,
}

/// Resolved logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Event filter.
    pub filter: EnvFilter,
    /// Output format.
    pub format: LogFormat,
    /// Optional log file.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Builds the logging configuration. `RUST_LOG` wins over `--verbose`,
    /// which wins over the configured level.
    #[must_use]
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Self {
        let directive = filter_directive(
            settings.level.as_deref(),
            verbose,
            std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(),
        );
        let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

        Self {
            filter,
            format: settings.format,
            file: settings.file.clone(),
        }
    }
}

fn filter_directive(configured: Option<&str>, verbose: bool, rust_log: Option<&str>) -> String {
    if let Some(env) = rust_log.filter(|v| !v.trim().is_empty()) {
        return env.to_string();
    }
    if verbose {
        return "debug".to_string();
    }
    configured
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(DEFAULT_LEVEL)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("anything"), LogFormat::Pretty);
    }

    #[test]
    fn test_filter_directive_precedence() {
        assert_eq!(filter_directive(Some("warn"), true, Some("trace")), "trace");
        assert_eq!(filter_directive(Some("warn"), true, None), "debug");
        assert_eq!(filter_directive(Some("warn"), false, Some(" ")), "warn");
        assert_eq!(filter_directive(None, false, None), "info");
    }
}
