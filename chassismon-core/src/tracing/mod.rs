//! Subscriber setup for the exporter's structured logs
//!
//! One `tracing-subscriber` formatter is installed per process; the filter
//! targets this workspace's crates unless a full directive is configured.
//! Span names for poll cycles and session refreshes live in [`span_names`].

use std::path::PathBuf;
use std::sync::OnceLock;

use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Configuration of the installed subscriber; set once
static INSTALLED: OnceLock<TracingConfig> = OnceLock::new();

/// Errors from [`init_tracing`] and level parsing
#[derive(Debug, Error)]
pub enum TracingError {
    /// The filter directive or subscriber was rejected
    #[error("Failed to initialize tracing: {0}")]
    InitializationFailed(String),

    /// Unrecognised level name
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    /// A subscriber is already installed
    #[error("Tracing has already been initialized")]
    AlreadyInitialized,

    /// The log file could not be opened
    #[error("Failed to create log file {path}: {reason}")]
    FileCreationFailed {
        /// Requested log file
        path: PathBuf,
        /// OS error text
        reason: String,
    },
}

/// Result type for tracing operations
pub type TracingResult<T> = Result<T, TracingError>;

/// Verbosity of the exporter's own targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum TracingLevel {
    /// Failures only
    Error,
    /// Per-record rejections and invalidated gauges
    Warn,
    /// Session lifecycle and cache misses
    #[default]
    Info,
    /// Per-cycle summaries
    Debug,
    /// Everything
    Trace,
}

impl TracingLevel {
    /// Directive spelling (`"warn"`, `"debug"`, ...)
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    /// Level for a `-v` count: 0 keeps `base`, then info, debug, trace
    #[must_use]
    pub const fn from_verbosity(count: u8, base: Self) -> Self {
        match count {
            0 => base,
            1 => Self::Info,
            2 => Self::Debug,
            _ => Self::Trace,
        }
    }
}

impl std::str::FromStr for TracingLevel {
    type Err = TracingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(TracingError::InvalidLevel(s.to_string())),
        }
    }
}

impl std::fmt::Display for TracingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where formatted events go
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TracingOutput {
    /// Standard output
    Stdout,
    /// Standard error
    #[default]
    Stderr,
    /// A file, truncated on start, without ANSI colours
    File {
        /// Path to the log file
        path: PathBuf,
    },
}

impl TracingOutput {
    fn writer(&self) -> TracingResult<(BoxMakeWriter, bool)> {
        match self {
            Self::Stdout => Ok((BoxMakeWriter::new(std::io::stdout), true)),
            Self::Stderr => Ok((BoxMakeWriter::new(std::io::stderr), true)),
            Self::File { path } => {
                let file =
                    std::fs::File::create(path).map_err(|e| TracingError::FileCreationFailed {
                        path: path.clone(),
                        reason: e.to_string(),
                    })?;
                Ok((BoxMakeWriter::new(file), false))
            }
        }
    }
}

/// What [`init_tracing`] installs
#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Level applied to the exporter's targets
    pub level: TracingLevel,
    /// Destination
    pub output: TracingOutput,
    /// Full `EnvFilter` directive overriding `level`
    pub filter: Option<String>,
}

impl TracingConfig {
    /// Info to stderr
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the level
    #[must_use]
    pub const fn with_level(mut self, level: TracingLevel) -> Self {
        self.level = level;
        self
    }

    /// Sets the destination
    #[must_use]
    pub fn with_output(mut self, output: TracingOutput) -> Self {
        self.output = output;
        self
    }

    /// Replaces the level-based directive
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Filter directive that will be installed
    #[must_use]
    pub fn filter_directive(&self) -> String {
        self.filter.clone().unwrap_or_else(|| {
            format!(
                "chassismon_core={level},chassismon={level}",
                level = self.level
            )
        })
    }
}

/// Installs the global subscriber described by `config`
///
/// # Errors
///
/// Returns [`TracingError::AlreadyInitialized`] on a second call,
/// [`TracingError::InitializationFailed`] for a bad filter directive, and
/// [`TracingError::FileCreationFailed`] if the log file cannot be opened.
pub fn init_tracing(config: &TracingConfig) -> TracingResult<()> {
    if INSTALLED.get().is_some() {
        return Err(TracingError::AlreadyInitialized);
    }
    let filter = EnvFilter::try_new(config.filter_directive())
        .map_err(|e| TracingError::InitializationFailed(e.to_string()))?;
    let (writer, ansi) = config.output.writer()?;

    INSTALLED
        .set(config.clone())
        .map_err(|_| TracingError::AlreadyInitialized)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_ansi(ansi)
                .with_writer(writer),
        )
        .try_init()
        .map_err(|e| TracingError::InitializationFailed(e.to_string()))?;

    tracing::debug!(directive = %config.filter_directive(), "Tracing initialized");
    Ok(())
}

/// Configuration passed to the successful [`init_tracing`] call, if any
#[must_use]
pub fn installed_config() -> Option<&'static TracingConfig> {
    INSTALLED.get()
}

/// Creates an info-level span; extra arguments are span fields
///
/// ```ignore
/// let span = chassismon_core::trace_operation!(span_names::POLL_CYCLE, cycle);
/// ```
#[macro_export]
macro_rules! trace_operation {
    ($name:expr) => {
        tracing::info_span!($name)
    };
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, $($field)*)
    };
}

/// Span names
pub mod span_names {
    /// One poll cycle
    pub const POLL_CYCLE: &str = "poll.cycle";
    /// Chassis sensor phase of a cycle
    pub const POLL_SENSORS: &str = "poll.sensors";
    /// Blade temperature phase of a cycle
    pub const POLL_BLADES: &str = "poll.blades";
    /// Scheduled session replacement
    pub const SESSION_REFRESH: &str = "session.refresh";
}
