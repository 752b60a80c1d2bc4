//! CLI error types and exit codes.

use chassismon_core::{ChassisError, ConfigError, MetricsError, SidebandError, TracingError};

/// Exit codes for CLI operations
pub mod exit_codes {
    /// General error - configuration, parsing, or other non-connection errors
    pub const GENERAL_ERROR: i32 = 1;
    /// Connection failure - the chassis shell or a blade BMC could not be
    /// reached
    pub const CONNECTION_FAILURE: i32 = 2;
}

/// CLI error type
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Settings or credentials problem
    #[error("Configuration error: {0}")]
    Config(String),

    /// Chassis shell or sideband connection failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// Command output did not parse
    #[error("Parse error: {0}")]
    Parse(String),

    /// Metric registry error
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// HTTP exposition failure
    #[error("Server error: {0}")]
    Server(String),

    /// Logging setup failure
    #[error("Logging error: {0}")]
    Logging(String),
}

impl From<ChassisError> for CliError {
    fn from(err: ChassisError) -> Self {
        match err {
            ChassisError::Transport(e) => Self::Connection(e.to_string()),
            ChassisError::Parse { .. } => Self::Parse(err.to_string()),
            ChassisError::Unresolved { .. } => Self::Config(err.to_string()),
            ChassisError::Sideband(e) => e.into(),
            ChassisError::Metrics(e) => e.into(),
            ChassisError::Config(e) => e.into(),
        }
    }
}

impl From<SidebandError> for CliError {
    fn from(err: SidebandError) -> Self {
        match err {
            SidebandError::Parse { .. }
            | SidebandError::NoReading { .. }
            | SidebandError::Units { .. } => Self::Parse(err.to_string()),
            SidebandError::Exec { .. }
            | SidebandError::ExitStatus { .. }
            | SidebandError::Timeout { .. } => Self::Connection(err.to_string()),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<MetricsError> for CliError {
    fn from(err: MetricsError) -> Self {
        Self::Metrics(err.to_string())
    }
}

impl From<TracingError> for CliError {
    fn from(err: TracingError) -> Self {
        Self::Logging(err.to_string())
    }
}

impl CliError {
    /// Returns the appropriate exit code for this error type.
    ///
    /// Exit codes:
    /// - 0: Success (not an error)
    /// - 1: General error (configuration, parsing, metrics, server, logging)
    /// - 2: Connection failure (chassis shell or BMC unreachable)
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Connection(_) => exit_codes::CONNECTION_FAILURE,
            Self::Config(_)
            | Self::Parse(_)
            | Self::Metrics(_)
            | Self::Server(_)
            | Self::Logging(_) => exit_codes::GENERAL_ERROR,
        }
    }
}
