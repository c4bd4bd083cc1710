// Logging system for Wrapman
use std::io::{self, IsTerminal};
use tracing::{Level, Subscriber};
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::Result;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: Level,
    /// Output format (pretty for terminals, json for programmatic use)
    pub format: LogFormat,
    /// Color output configuration
    pub color: ColorConfig,
    /// Whether to show targets (module names)
    pub show_targets: bool,
    /// Whether to show timestamps
    pub show_timestamps: bool,
}

/// Log output format options
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    /// Pretty output for terminals
    Pretty,
    /// JSON output for log collectors
    Json,
    /// Compact format for structured logging
    Compact,
}

/// Color output configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ColorConfig {
    /// Automatically detect if colors should be used
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            color: ColorConfig::Auto,
            show_targets: false,
            show_timestamps: false,
        }
    }
}

impl LogFormat {
    /// Parse a format name, falling back to pretty output
    pub fn from_name(name: Option<&str>) -> Self {
        match name {
            Some("json") => LogFormat::Json,
            Some("compact") => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

impl LogConfig {
    /// Create logging configuration from CLI arguments
    pub fn from_cli(verbose: bool, quiet: bool, color: Option<String>) -> Self {
        let level = if quiet {
            Level::ERROR
        } else if verbose {
            Level::DEBUG
        } else {
            Level::INFO
        };

        let color_config = match color.as_deref() {
            Some("always") => ColorConfig::Always,
            Some("never") => ColorConfig::Never,
            _ => ColorConfig::Auto,
        };

        Self {
            level,
            format: LogFormat::Pretty,
            color: color_config,
            show_targets: false,
            show_timestamps: false,
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_timestamps(mut self, show_timestamps: bool) -> Self {
        self.show_timestamps = show_timestamps;
        self
    }

    /// Check if colors should be used based on configuration and terminal
    pub fn should_use_colors(&self) -> bool {
        match self.color {
            ColorConfig::Always => true,
            ColorConfig::Never => false,
            ColorConfig::Auto => {
                io::stderr().is_terminal()
                    && std::env::var("TERM").map_or(true, |term| term != "dumb")
                    && std::env::var("NO_COLOR").is_err()
            }
        }
    }

    /// Formatting layer for this configuration, writing to `writer`
    pub fn layer<S, W>(&self, writer: W) -> Box<dyn Layer<S> + Send + Sync + 'static>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let ansi = self.should_use_colors();
        let base = fmt::layer()
            .with_writer(writer)
            .with_target(self.show_targets);

        match (&self.format, self.show_timestamps) {
            (LogFormat::Pretty, true) => base.with_ansi(ansi).boxed(),
            (LogFormat::Pretty, false) => base.with_ansi(ansi).without_time().boxed(),
            (LogFormat::Json, true) => base.json().boxed(),
            (LogFormat::Json, false) => base.json().without_time().boxed(),
            (LogFormat::Compact, true) => base.with_ansi(ansi).compact().boxed(),
            (LogFormat::Compact, false) => base.with_ansi(ansi).compact().without_time().boxed(),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_env("WRAPMAN_LOG")
            .unwrap_or_else(|_| EnvFilter::new(format!("wrapman={}", self.level)))
    }
}

/// Initialize the logging system with the given configuration
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init_logging(config: LogConfig) -> Result<()> {
    let installed = tracing_subscriber::registry()
        .with(config.env_filter())
        .with(config.layer(io::stderr))
        .try_init();

    // A subscriber installed earlier in the process (tests, embedding services) wins.
    if let Err(e) = installed {
        tracing::debug!("Global subscriber already set: {e}");
    }

    Ok(())
}

/// Logging utilities for registry operations
pub mod utils {
    use std::path::Path;
    use tracing::{debug, error, info, span, warn, Level, Span};

    /// Create a span for loading one matrix cell
    pub fn cell_loading_span(ecosystem_version: &str, language_version: &str) -> Span {
        span!(
            Level::DEBUG,
            "cell_loading",
            ecosystem_version = %ecosystem_version,
            language_version = %language_version
        )
    }

    /// Create a span for configuration loading
    pub fn config_loading_span(config_path: &Path) -> Span {
        span!(Level::DEBUG, "config_loading", path = %config_path.display())
    }

    pub fn log_cell_loaded(ecosystem_version: &str, language_version: &str, is_default: bool) {
        info!(
            ecosystem_version = %ecosystem_version,
            language_version = %language_version,
            is_default = is_default,
            "Compiler wrapper loaded"
        );
    }

    /// One structured record per failed cell
    pub fn log_cell_failure(ecosystem_version: &str, language_version: &str, cause: &str) {
        error!(
            ecosystem_version = %ecosystem_version,
            language_version = %language_version,
            cause = %cause,
            "Can't initialize compiler wrapper"
        );
    }

    pub fn log_registry_summary(loaded: usize, failed: usize, default: Option<(&str, &str)>) {
        match default {
            Some((ecosystem_version, language_version)) => info!(
                loaded = loaded,
                failed = failed,
                default_ecosystem_version = %ecosystem_version,
                default_language_version = %language_version,
                "Wrapper registry initialized"
            ),
            None => warn!(
                loaded = loaded,
                failed = failed,
                "Wrapper registry initialized without a default wrapper"
            ),
        }
    }

    pub fn log_config_validation(config_path: &Path, valid: bool) {
        if valid {
            debug!(path = %config_path.display(), "Configuration validation passed");
        } else {
            error!(path = %config_path.display(), "Configuration validation failed");
        }
    }
}
