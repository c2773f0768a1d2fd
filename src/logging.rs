//! Logging setup for topogen.
//!
//! A one-shot CLI tool logs to stderr only; there is no file appender here.
//!
//! # Environment Variables
//!
//! - `TOPOGEN_LOG` - Log filter (overrides RUST_LOG)
//! - `TOPOGEN_LOG_LEVEL` - Log level: error, warn, info, debug, trace
//! - `TOPOGEN_LOG_FORMAT` - Output format: pretty, compact, json
//! - `RUST_LOG` - Standard Rust log filter (fallback)

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Compact single-line format (default for a short-lived CLI)
    #[default]
    Compact,
    /// Human-readable pretty format
    Pretty,
    /// JSON format for log aggregation systems
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" | "full" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!(
                "Unknown log format: '{}'. Valid options: compact, pretty, json",
                s
            )),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level (default: INFO)
    pub level: Level,
    /// Log format (default: Compact)
    pub format: LogFormat,
    /// Custom filter string (overrides level if set)
    pub filter: Option<String>,
    /// Show target module in logs (default: false)
    pub show_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            filter: None,
            show_target: false,
        }
    }
}

impl LogConfig {
    /// Set the log level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Apply environment variable overrides.
    ///
    /// CLI arguments take precedence: if a filter is already set, env vars
    /// won't override it.
    pub fn with_env_overrides(mut self) -> Self {
        if self.filter.is_none() {
            if let Ok(filter) = std::env::var("TOPOGEN_LOG") {
                self.filter = Some(filter);
            } else if let Ok(filter) = std::env::var("RUST_LOG") {
                self.filter = Some(filter);
            }
        }

        if self.filter.is_none() {
            if let Ok(level_str) = std::env::var("TOPOGEN_LOG_LEVEL") {
                self.level = parse_level(&level_str).unwrap_or(self.level);
            }
        }

        if let Ok(format) = std::env::var("TOPOGEN_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.format = f;
            }
        }

        self
    }

    /// Build the EnvFilter for this configuration.
    fn build_filter(&self) -> EnvFilter {
        if let Some(ref filter) = self.filter {
            EnvFilter::try_new(filter).unwrap_or_else(|_| {
                eprintln!("Warning: Invalid log filter '{}', using default", filter);
                EnvFilter::new(format!("{}", self.level).to_lowercase())
            })
        } else {
            EnvFilter::new(format!("{}", self.level).to_lowercase())
        }
    }
}

/// Parse a log level string.
fn parse_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

/// Initialize the global tracing subscriber.
///
/// Should be called once at program startup; subsequent calls are silently
/// ignored.
pub fn init(config: LogConfig) {
    let filter = config.build_filter();

    let result = match config.format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_target(config.show_target)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()
        }
        LogFormat::Compact => {
            let layer = fmt::layer()
                .compact()
                .without_time()
                .with_target(config.show_target)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()
        }
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .with_target(config.show_target)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()
        }
    };

    // Already-initialized is fine (idempotent)
    let _ = result;
}
