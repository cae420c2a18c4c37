//! Logging setup for invoke-di
//!
//! The registry emits `tracing` events under the `invoke_di` target:
//! registrations and registry creation at DEBUG, every resolution at TRACE.
//! This module installs a subscriber for applications that do not bring
//! their own.
//!
//! # Features
//!
//! - `logging` - Emit events (default)
//! - `logging-json` - JSON structured output (recommended for production)
//! - `logging-pretty` - Human-readable output (recommended for development)
//!
//! Without a subscriber feature the `init*` functions do nothing.
//!
//! # Example
//!
//! ```rust,ignore
//! use invoke_di::logging;
//!
//! // JSON if logging-json is enabled, pretty otherwise
//! logging::init();
//!
//! // Or configure it
//! logging::builder()
//!     .trace()
//!     .compact()
//!     .di_only()
//!     .with_thread_names()
//!     .init();
//! ```
//!
//! The `INVOKE_DI_LOG` environment variable, when set, replaces the
//! configured filter (same syntax as `RUST_LOG`).

use tracing::Level;

/// Environment variable that overrides the configured filter
pub const LOG_ENV_VAR: &str = "INVOKE_DI_LOG";

/// Target of every event emitted by this crate
pub const LOG_TARGET: &str = "invoke_di";

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON structured logging (production default)
    #[default]
    Json,
    /// Multi-line human-readable output
    Pretty,
    /// Single-line output
    Compact,
}

/// Parse a level name (`trace`, `debug`, `info`, `warn`/`warning`, `error`).
pub fn parse_level(level: &str) -> Option<Level> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Builder for the logging subscriber
#[derive(Debug, Clone)]
#[cfg_attr(
    not(any(feature = "logging-json", feature = "logging-pretty")),
    allow(dead_code)
)]
pub struct LoggingBuilder {
    level: Level,
    format: LogFormat,
    target: Option<&'static str>,
    with_file: bool,
    with_line_number: bool,
    with_thread_ids: bool,
    with_thread_names: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::Json,
            target: None,
            with_file: false,
            with_line_number: false,
            with_thread_ids: false,
            with_thread_names: false,
        }
    }
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn trace(self) -> Self {
        self.with_level(Level::TRACE)
    }

    pub fn debug(self) -> Self {
        self.with_level(Level::DEBUG)
    }

    pub fn info(self) -> Self {
        self.with_level(Level::INFO)
    }

    pub fn warn(self) -> Self {
        self.with_level(Level::WARN)
    }

    pub fn error(self) -> Self {
        self.with_level(Level::ERROR)
    }

    /// Only show events from `target`
    pub fn with_target_filter(mut self, target: &'static str) -> Self {
        self.target = Some(target);
        self
    }

    /// Only show this crate's events
    pub fn di_only(self) -> Self {
        self.with_target_filter(LOG_TARGET)
    }

    pub fn with_file(mut self) -> Self {
        self.with_file = true;
        self
    }

    pub fn with_line_number(mut self) -> Self {
        self.with_line_number = true;
        self
    }

    pub fn with_thread_ids(mut self) -> Self {
        self.with_thread_ids = true;
        self
    }

    pub fn with_thread_names(mut self) -> Self {
        self.with_thread_names = true;
        self
    }

    pub fn json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.format = LogFormat::Pretty;
        self
    }

    pub fn compact(mut self) -> Self {
        self.format = LogFormat::Compact;
        self
    }

    /// Filter directive for the configured level and target
    pub fn directive(&self) -> String {
        match self.target {
            Some(target) => format!("{target}={}", self.level),
            None => self.level.to_string(),
        }
    }

    /// Install the subscriber globally.
    ///
    /// Does nothing if a global subscriber is already set.
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    pub fn init(self) {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
            .unwrap_or_else(|_| EnvFilter::new(self.directive()));

        let layer = fmt::layer()
            .with_file(self.with_file)
            .with_line_number(self.with_line_number)
            .with_thread_ids(self.with_thread_ids)
            .with_thread_names(self.with_thread_names)
            .with_target(true);

        // The layer types differ per format, so each branch installs its own.
        let registry = tracing_subscriber::registry().with(filter);
        let _ = match self.format {
            #[cfg(feature = "logging-json")]
            LogFormat::Json => registry.with(layer.json()).try_init(),
            #[cfg(not(feature = "logging-json"))]
            LogFormat::Json => registry.with(layer.pretty()).try_init(),
            LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
            LogFormat::Compact => registry.with(layer.compact()).try_init(),
        };
    }

    /// Install the subscriber (no-op without a subscriber feature)
    #[cfg(not(any(feature = "logging-json", feature = "logging-pretty")))]
    pub fn init(self) {}
}

/// Create a new logging builder
pub fn builder() -> LoggingBuilder {
    LoggingBuilder::new()
}

/// Initialize logging with default settings.
///
/// JSON when `logging-json` is enabled, pretty output otherwise.
pub fn init() {
    if cfg!(feature = "logging-json") {
        init_json();
    } else {
        init_pretty();
    }
}

/// Initialize JSON structured logging at DEBUG
///
/// # Example output
/// ```json
/// {"timestamp":"2024-01-01T00:00:00.000Z","level":"DEBUG","target":"invoke_di","message":"Creating new root registry"}
/// ```
pub fn init_json() {
    builder().json().debug().init();
}

/// Initialize human-readable logging at DEBUG
///
/// # Example output
/// ```text
///   2024-01-01T00:00:00.000Z DEBUG invoke_di: Creating new root registry
/// ```
pub fn init_pretty() {
    builder().pretty().debug().init();
}

/// Initialize DEBUG logging for this crate only (filters other crates)
pub fn init_di_only() {
    builder().di_only().debug().init();
}
