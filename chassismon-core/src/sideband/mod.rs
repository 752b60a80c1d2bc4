//! Per-blade sensor access over IPMI
//!
//! The chassis controller reports power allocation per slot but not blade
//! temperatures; those are read from each blade's own BMC.

mod ipmitool;

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::parser::ParseError;

pub use ipmitool::{DEFAULT_IPMI_PORT, IpmiToolClient};

/// Errors raised while reading a blade sensor
#[derive(Debug, thiserror::Error)]
pub enum SidebandError {
    /// The IPMI tool could not be started
    #[error("failed to run ipmitool against {addr}: {reason}")]
    Exec {
        /// BMC address
        addr: IpAddr,
        /// Failure description
        reason: String,
    },
    /// The IPMI tool reported a failure
    #[error("ipmitool against {addr} exited with {status}: {stderr}")]
    ExitStatus {
        /// BMC address
        addr: IpAddr,
        /// Exit status
        status: String,
        /// Trimmed standard error
        stderr: String,
    },
    /// The BMC did not answer in time
    #[error("reading {addr} timed out after {secs}s")]
    Timeout {
        /// BMC address
        addr: IpAddr,
        /// Timeout that elapsed
        secs: u64,
    },
    /// The sensor record could not be parsed
    #[error("failed to parse sensor record from {addr}: {source}")]
    Parse {
        /// BMC address
        addr: IpAddr,
        /// Parser failure
        #[source]
        source: ParseError,
    },
    /// The sensor exists but has no current reading
    #[error("sensor {sensor:?} on {addr} has no reading")]
    NoReading {
        /// BMC address
        addr: IpAddr,
        /// Sensor name
        sensor: String,
    },
    /// The reading is not in degrees Celsius
    #[error("sensor {sensor:?} on {addr} reports unexpected units {units:?}")]
    Units {
        /// BMC address
        addr: IpAddr,
        /// Sensor name
        sensor: String,
        /// Units reported
        units: String,
    },
}

/// Result type for sideband reads
pub type SidebandResult<T> = Result<T, SidebandError>;

/// Reads blade sensors given the blade's management address
#[async_trait]
pub trait SidebandSensors: Send + Sync {
    /// Inlet temperature of the blade at `addr`, in degrees Celsius
    ///
    /// # Errors
    ///
    /// Returns a [`SidebandError`] if the BMC cannot be reached or the
    /// reading is missing.
    async fn ambient_temperature(&self, addr: IpAddr, port: u16) -> SidebandResult<f64>;
}

#[async_trait]
impl<T: SidebandSensors + ?Sized> SidebandSensors for Arc<T> {
    async fn ambient_temperature(&self, addr: IpAddr, port: u16) -> SidebandResult<f64> {
        (**self).ambient_temperature(addr, port).await
    }
}
