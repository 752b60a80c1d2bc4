//! Exporter settings and chassis credentials
//!
//! Settings live in a TOML file where every key is optional. Credentials
//! come from a separate JSON payload so they can be mounted as a secret.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use chrono_tz::Tz;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::parser::ParseContext;
use crate::session::{DEFAULT_SSH_PORT, HostKeyPolicy, SshTarget};

/// Errors raised while loading settings or credentials
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read {path}: {reason}")]
    Read {
        /// File that failed
        path: String,
        /// OS error text
        reason: String,
    },
    /// The file is not valid TOML / JSON for its type
    #[error("Failed to parse {what}: {reason}")]
    Parse {
        /// Which document failed
        what: &'static str,
        /// Deserializer error text
        reason: String,
    },
    /// Unknown IANA time zone name
    #[error("Unknown time zone: {0}")]
    Timezone(String),
    /// Malformed host, port or listen address
    #[error("Invalid address {value}: {reason}")]
    Address {
        /// The rejected text
        value: String,
        /// Why it was rejected
        reason: String,
    },
    /// A required credential is empty
    #[error("Missing credential field: {0}")]
    Missing(&'static str),
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

fn read_file(path: &Path) -> ConfigResult<String> {
    fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Logging section (`[logging]`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Level applied to this crate's targets
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Full `EnvFilter` directive; overrides `level` when set
    #[serde(default)]
    pub filter: Option<String>,
    /// Write to this file instead of stderr
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            filter: None,
            file: None,
        }
    }
}

/// Exporter settings (`chassismon.toml`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExporterSettings {
    /// Seconds between poll cycles (default: 30)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Seconds between session replacements (default: 1500)
    #[serde(default = "default_session_refresh_secs")]
    pub session_refresh_secs: u64,
    /// IANA zone the controller's clock runs in
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Blade BMC port (default: 623)
    #[serde(default = "default_ipmi_port")]
    pub ipmi_port: u16,
    /// Address the `/metrics` endpoint binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Unit ambient rows must carry to be exported
    #[serde(default = "default_ambient_unit")]
    pub ambient_unit: String,
    /// Unit fan rows must carry to be exported
    #[serde(default = "default_fan_unit")]
    pub fan_unit: String,
    /// SSH connect timeout in seconds (default: 10)
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Upper bound on one remote command in seconds (default: 60)
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    /// Host key verification for the chassis shell
    #[serde(default)]
    pub host_key_policy: HostKeyPolicy,
    /// Logging
    #[serde(default)]
    pub logging: LoggingSettings,
}

const fn default_poll_interval_secs() -> u64 {
    30
}

const fn default_session_refresh_secs() -> u64 {
    25 * 60
}

fn default_timezone() -> String {
    "America/Los_Angeles".to_string()
}

const fn default_ipmi_port() -> u16 {
    crate::sideband::DEFAULT_IPMI_PORT
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_ambient_unit() -> String {
    "Celsius".to_string()
}

fn default_fan_unit() -> String {
    "rpm".to_string()
}

const fn default_connect_timeout_secs() -> u64 {
    10
}

const fn default_command_timeout_secs() -> u64 {
    60
}

impl Default for ExporterSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            session_refresh_secs: default_session_refresh_secs(),
            timezone: default_timezone(),
            ipmi_port: default_ipmi_port(),
            listen_addr: default_listen_addr(),
            ambient_unit: default_ambient_unit(),
            fan_unit: default_fan_unit(),
            connect_timeout_secs: default_connect_timeout_secs(),
            command_timeout_secs: default_command_timeout_secs(),
            host_key_policy: HostKeyPolicy::default(),
            logging: LoggingSettings::default(),
        }
    }
}

const fn at_least_one_sec(secs: u64) -> Duration {
    if secs == 0 {
        Duration::from_secs(1)
    } else {
        Duration::from_secs(secs)
    }
}

impl ExporterSettings {
    /// Parses settings from TOML text
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML or mistyped keys.
    pub fn from_toml(text: &str) -> ConfigResult<Self> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            what: "settings",
            reason: e.to_string(),
        })
    }

    /// Reads settings from `path`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load(path: &Path) -> ConfigResult<Self> {
        Self::from_toml(&read_file(path)?)
    }

    /// Poll interval, never zero
    #[must_use]
    pub const fn effective_poll_interval(&self) -> Duration {
        at_least_one_sec(self.poll_interval_secs)
    }

    /// Session refresh interval, never zero
    #[must_use]
    pub const fn effective_session_refresh(&self) -> Duration {
        at_least_one_sec(self.session_refresh_secs)
    }

    /// SSH connect timeout, never zero
    #[must_use]
    pub const fn effective_connect_timeout(&self) -> Duration {
        at_least_one_sec(self.connect_timeout_secs)
    }

    /// Remote command timeout, never zero
    #[must_use]
    pub const fn effective_command_timeout(&self) -> Duration {
        at_least_one_sec(self.command_timeout_secs)
    }

    /// The configured time zone
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Timezone`] for names not in the tz database.
    pub fn timezone(&self) -> ConfigResult<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::Timezone(self.timezone.clone()))
    }

    /// Parse context carrying the configured time zone
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Timezone`] for an unknown zone.
    pub fn parse_context(&self) -> ConfigResult<ParseContext> {
        Ok(ParseContext::new(self.timezone()?))
    }

    /// Socket address for the metrics listener
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Address`] if `listen_addr` is not `ip:port`.
    pub fn listen_socket(&self) -> ConfigResult<SocketAddr> {
        self.listen_addr
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Address {
                value: self.listen_addr.clone(),
                reason: e.to_string(),
            })
    }
}

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

/// Sideband (IPMI) login shared by every blade
#[derive(Debug, Clone, Deserialize)]
pub struct IpmiCredentials {
    /// BMC user
    #[serde(rename = "User", default)]
    pub user: String,
    /// BMC password
    #[serde(rename = "Password", default = "empty_secret")]
    pub password: SecretString,
}

impl Default for IpmiCredentials {
    fn default() -> Self {
        Self {
            user: String::new(),
            password: empty_secret(),
        }
    }
}

/// Credentials payload
///
/// ```json
/// {"User": "root", "Password": "...", "Addr": "cmc.example:22",
///  "IPMI": {"User": "root", "Password": "..."}}
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    /// Chassis shell user
    #[serde(rename = "User", default)]
    pub user: String,
    /// Chassis shell password
    #[serde(rename = "Password", default = "empty_secret")]
    pub password: SecretString,
    /// Chassis address as `host[:port]`
    #[serde(rename = "Addr", default)]
    pub addr: String,
    /// Blade BMC login
    #[serde(rename = "IPMI", default)]
    pub ipmi: IpmiCredentials,
}

impl Credentials {
    /// Parses and validates a JSON payload
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::Missing`] for an empty user, address or BMC user.
    pub fn from_json(text: &str) -> ConfigResult<Self> {
        let creds: Self = serde_json::from_str(text).map_err(|e| ConfigError::Parse {
            what: "credentials",
            reason: e.to_string(),
        })?;
        creds.validate()?;
        Ok(creds)
    }

    /// Reads credentials from `path`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`], [`ConfigError::Parse`] or
    /// [`ConfigError::Missing`].
    pub fn load(path: &Path) -> ConfigResult<Self> {
        Self::from_json(&read_file(path)?)
    }

    /// Checks that the chassis and blade logins are usable
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] naming the first empty field. An
    /// absent `IPMI` block reports `IPMI.User`.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.user.trim().is_empty() {
            return Err(ConfigError::Missing("User"));
        }
        if self.addr.trim().is_empty() {
            return Err(ConfigError::Missing("Addr"));
        }
        if self.ipmi.user.trim().is_empty() {
            return Err(ConfigError::Missing("IPMI.User"));
        }
        Ok(())
    }

    /// Splits `Addr` into host and port
    ///
    /// Accepts `host`, `host:port`, a bare IPv6 address and `[v6]:port`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Address`] for an unterminated bracket or a bad
    /// port.
    pub fn chassis_endpoint(&self) -> ConfigResult<(String, u16)> {
        split_host_port(self.addr.trim(), DEFAULT_SSH_PORT)
    }

    /// Login target for the chassis shell
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Address`] if `Addr` is malformed.
    pub fn ssh_target(&self) -> ConfigResult<SshTarget> {
        let (host, port) = self.chassis_endpoint()?;
        Ok(SshTarget {
            host,
            port,
            user: self.user.clone(),
            password: self.password.clone(),
        })
    }
}

fn split_host_port(addr: &str, default_port: u16) -> ConfigResult<(String, u16)> {
    let bad = |reason: &str| ConfigError::Address {
        value: addr.to_string(),
        reason: reason.to_string(),
    };
    let parse_port = |text: &str| {
        text.parse::<u16>()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| bad("port must be 1-65535"))
    };

    if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(|| bad("missing ']'"))?;
        return match tail.strip_prefix(':') {
            Some(port) => Ok((host.to_string(), parse_port(port)?)),
            None if tail.is_empty() => Ok((host.to_string(), default_port)),
            None => Err(bad("unexpected text after ']'")),
        };
    }

    match addr.split_once(':') {
        Some((host, port)) if !port.contains(':') => {
            if host.is_empty() {
                return Err(bad("empty host"));
            }
            Ok((host.to_string(), parse_port(port)?))
        }
        // More than one colon: a bare IPv6 address
        Some(_) | None => Ok((addr.to_string(), default_port)),
    }
}
