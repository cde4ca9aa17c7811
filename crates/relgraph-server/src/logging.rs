//! Structured logging bootstrap.
//!
//! Installs a global `tracing-subscriber` registry with an `EnvFilter`
//! (`RUST_LOG` wins over the configured level) and either a JSON or a pretty
//! text formatter.
//!
//! ```ignore
//! use relgraph_server::logging::{init_logging, LoggingConfig};
//!
//! let config = ServerConfig::from_env()?;
//! init_logging(LoggingConfig::from_settings(&config.logging));
//! ```

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::config::LoggingSettings;

/// Logging options resolved from `LoggingSettings`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// JSON lines (true) or pretty text (false)
    pub json_format: bool,
    /// Level used when RUST_LOG is not set
    pub default_level: Level,
    /// Emit span enter/exit events
    pub include_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json_format: false,
            default_level: Level::INFO,
            include_spans: false,
        }
    }
}

impl LoggingConfig {
    /// Builds the options from the `logging` section of the service config.
    ///
    /// An unrecognised level falls back to INFO; `ServerConfig::validate`
    /// rejects those before they get here.
    pub fn from_settings(settings: &LoggingSettings) -> Self {
        Self {
            json_format: settings.json,
            default_level: Level::from_str(&settings.level).unwrap_or(Level::INFO),
            include_spans: false,
        }
    }

    /// Set the default log level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    /// Include span events in the output.
    pub fn with_spans(mut self) -> Self {
        self.include_spans = true;
        self
    }

    fn span_events(&self) -> FmtSpan {
        if self.include_spans {
            FmtSpan::ENTER | FmtSpan::EXIT
        } else {
            FmtSpan::NONE
        }
    }
}

/// Installs the global subscriber.
///
/// Returns false if a global subscriber was already set; the existing one
/// stays in place.
pub fn init_logging(config: LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_level.to_string()));

    let installed = if config.json_format {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .json()
                .with_span_events(config.span_events())
                .with_current_span(true)
                .with_target(true)
                .with_file(false)
                .with_line_number(false),
        );
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .pretty()
                .with_span_events(config.span_events())
                .with_target(true),
        );
        tracing::subscriber::set_global_default(subscriber)
    };

    installed.is_ok()
}

/// JSON subscriber writing to `writer`, for capturing log output.
pub fn json_subscriber<W>(writer: W) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'writer> fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(EnvFilter::new("trace"))
        .with(
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_target(true)
                .with_current_span(true),
        )
}
