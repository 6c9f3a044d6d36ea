//! Per-processor logging on top of `tracing`.
//!
//! Every [`FieldDataProcessor`](crate::FieldDataProcessor) owns a
//! [`FieldLogger`] with its own name and verbosity. Output goes through a
//! process-wide `tracing-subscriber` fmt layer on stdout that is installed at
//! most once, no matter how many processors are created.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

/// Base name shared by all processor loggers.
pub const LOGGER_BASE_NAME: &str = "field_processing.FieldDataProcessor";

static SUBSCRIBER: OnceCell<()> = OnceCell::new();
static NEXT_LOGGER_ID: AtomicU64 = AtomicU64::new(1);

/// Verbosity selector for a processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    /// Logging disabled for this processor.
    None,
}

impl LogLevel {
    /// Parse a selector case-insensitively. Unrecognized values fall back to `Info`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Self::Debug,
            "INFO" => Self::Info,
            "NONE" => Self::None,
            _ => Self::Info,
        }
    }

    fn allows(&self, level: tracing::Level) -> bool {
        match self {
            Self::None => false,
            Self::Info => level <= tracing::Level::INFO,
            Self::Debug => level <= tracing::Level::DEBUG,
        }
    }
}

impl From<&str> for LogLevel {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => f.write_str("DEBUG"),
            Self::Info => f.write_str("INFO"),
            Self::None => f.write_str("NONE"),
        }
    }
}

/// Install the stdout subscriber once for the whole process.
///
/// `RUST_LOG` overrides the default filter. If the host application already
/// installed a global subscriber, that one is kept.
pub fn init_stdout_subscriber() {
    SUBSCRIBER.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("field_processing=debug"));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stdout)
            .with_target(false)
            .try_init();
    });
}

/// A named logger scoped to one processor instance.
#[derive(Debug, Clone)]
pub struct FieldLogger {
    name: String,
    level: LogLevel,
}

impl FieldLogger {
    /// Create a logger with a fresh unique name.
    ///
    /// The shared subscriber is installed on first use unless `level` is `None`.
    pub fn new(level: LogLevel) -> Self {
        let id = NEXT_LOGGER_ID.fetch_add(1, Ordering::Relaxed);
        let logger = Self {
            name: format!("{LOGGER_BASE_NAME}#{id}"),
            level,
        };
        if logger.is_enabled() {
            init_stdout_subscriber();
        }
        logger
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn is_enabled(&self) -> bool {
        self.level != LogLevel::None
    }

    pub fn debug(&self, message: impl fmt::Display) {
        if self.level.allows(tracing::Level::DEBUG) {
            tracing::debug!(logger = %self.name, "{}", message);
        }
    }

    pub fn info(&self, message: impl fmt::Display) {
        if self.level.allows(tracing::Level::INFO) {
            tracing::info!(logger = %self.name, "{}", message);
        }
    }

    pub fn warn(&self, message: impl fmt::Display) {
        if self.level.allows(tracing::Level::WARN) {
            tracing::warn!(logger = %self.name, "{}", message);
        }
    }

    pub fn error(&self, message: impl fmt::Display) {
        if self.level.allows(tracing::Level::ERROR) {
            tracing::error!(logger = %self.name, "{}", message);
        }
    }
}
