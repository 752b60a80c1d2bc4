//! Crate-level error type
//!
//! Each module owns its own error enum; [`ChassisError`] gathers them so
//! callers can tell a dropped transport from unparsable output.

use thiserror::Error;

use crate::config::ConfigError;
use crate::metrics::MetricsError;
use crate::parser::ParseError;
use crate::session::TransportError;
use crate::sideband::SidebandError;

/// Top-level error for chassis operations
#[derive(Debug, Error)]
pub enum ChassisError {
    /// The remote command could not be run or exited non-zero
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The command ran but its output did not parse
    #[error("Failed to parse output of '{command}': {source}")]
    Parse {
        /// Command whose output was rejected
        command: String,
        /// Parser failure
        #[source]
        source: ParseError,
    },

    /// The chassis reported no management address for a blade
    #[error("No iDRAC address configured for slot {slot}")]
    Unresolved {
        /// Blade slot
        slot: u32,
    },

    /// A blade sensor read failed
    #[error(transparent)]
    Sideband(#[from] SidebandError),

    /// Publishing a reading failed
    #[error(transparent)]
    Metrics(#[from] MetricsError),

    /// Settings or credentials are unusable
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ChassisError {
    /// Whether the failure happened before any output was read
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Result type for chassis operations
pub type ChassisResult<T> = Result<T, ChassisError>;
