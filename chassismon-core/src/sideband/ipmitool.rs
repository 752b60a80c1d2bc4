//! [`SidebandSensors`] backed by the `ipmitool` binary

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::process::Command;
use tokio::sync::Mutex;

use super::{SidebandError, SidebandResult, SidebandSensors};
use crate::parser::ParseContext;
use crate::schema::SensorRecord;
use crate::schema::sdr::{self, AMBIENT_SENSOR};

/// RMCP+ port of a blade BMC
pub const DEFAULT_IPMI_PORT: u16 = 623;

/// Units `ipmitool` prints for Celsius sensors
const CELSIUS_UNITS: &str = "degrees C";

/// One BMC, created on first use
///
/// BMCs only hold a handful of RMCP+ sessions, so reads against one
/// endpoint take turns on `busy`. Different BMCs are read concurrently.
#[derive(Debug)]
struct Endpoint {
    addr: SocketAddr,
    busy: Mutex<()>,
}

impl Endpoint {
    fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            busy: Mutex::new(()),
        }
    }

    fn command(&self, user: &str, password: &SecretString) -> Command {
        let mut cmd = Command::new("ipmitool");
        cmd.arg("-I")
            .arg("lanplus")
            .arg("-H")
            .arg(self.addr.ip().to_string())
            .arg("-p")
            .arg(self.addr.port().to_string())
            .arg("-U")
            .arg(user)
            .arg("-E")
            .env("IPMI_PASSWORD", password.expose_secret())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Reads sensors by running `ipmitool -I lanplus`.
///
/// The password is passed through `IPMI_PASSWORD` so it never shows up in
/// the process list.
pub struct IpmiToolClient {
    user: String,
    password: SecretString,
    timeout: Duration,
    endpoints: Mutex<HashMap<SocketAddr, Arc<Endpoint>>>,
}

impl IpmiToolClient {
    /// Creates a client that logs in to every BMC as `user`
    #[must_use]
    pub fn new(user: impl Into<String>, password: SecretString) -> Self {
        Self {
            user: user.into(),
            password,
            timeout: Duration::from_secs(15),
            endpoints: Mutex::new(HashMap::new()),
        }
    }

    /// Sets how long one read may take
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn endpoint(&self, addr: SocketAddr) -> Arc<Endpoint> {
        let mut endpoints = self.endpoints.lock().await;
        Arc::clone(endpoints.entry(addr).or_insert_with(|| {
            tracing::info!(%addr, "Initialising IPMI endpoint");
            Arc::new(Endpoint::new(addr))
        }))
    }

    /// Number of BMCs contacted so far
    pub async fn endpoint_count(&self) -> usize {
        self.endpoints.lock().await.len()
    }

    /// Forgets every cached endpoint; reads in flight finish on their own
    pub async fn close(&self) {
        self.endpoints.lock().await.clear();
    }

    /// Reads the sensor data record named `sensor`
    ///
    /// Waits for any other read of the same BMC to finish first. The wait
    /// does not count against the read timeout.
    ///
    /// # Errors
    ///
    /// Returns a [`SidebandError`] if `ipmitool` fails or its output does
    /// not parse.
    pub async fn read_sensor(
        &self,
        addr: IpAddr,
        port: u16,
        sensor: &str,
    ) -> SidebandResult<SensorRecord> {
        let endpoint = self.endpoint(SocketAddr::new(addr, port)).await;
        let _turn = endpoint.busy.lock().await;
        let mut cmd = endpoint.command(&self.user, &self.password);
        cmd.args(sdr::command_args(sensor));

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(SidebandError::Exec {
                    addr,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(SidebandError::Timeout {
                    addr,
                    secs: self.timeout.as_secs(),
                });
            }
        };
        if !output.status.success() {
            return Err(SidebandError::ExitStatus {
                addr,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        sdr::parse(output.stdout.as_slice(), &ParseContext::default())
            .map_err(|source| SidebandError::Parse { addr, source })
    }
}

/// Extracts a Celsius value from an ambient temperature record
fn celsius(addr: IpAddr, record: &SensorRecord) -> SidebandResult<f64> {
    let Some(reading) = record.reading else {
        return Err(SidebandError::NoReading {
            addr,
            sensor: AMBIENT_SENSOR.to_string(),
        });
    };
    if record.units != CELSIUS_UNITS {
        return Err(SidebandError::Units {
            addr,
            sensor: AMBIENT_SENSOR.to_string(),
            units: record.units.clone(),
        });
    }
    Ok(reading)
}

#[async_trait]
impl SidebandSensors for IpmiToolClient {
    async fn ambient_temperature(&self, addr: IpAddr, port: u16) -> SidebandResult<f64> {
        let record = self.read_sensor(addr, port, AMBIENT_SENSOR).await?;
        celsius(addr, &record)
    }
}
