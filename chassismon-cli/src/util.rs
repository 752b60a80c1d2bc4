//! Shared utility functions used across command modules.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chassismon_core::config::IpmiCredentials;
use chassismon_core::{
    ChassisClient, Credentials, ExporterSettings, IpmiToolClient, OpenSshConnector,
    SessionManager, TracingConfig, TracingLevel, TracingOutput, init_tracing,
};
use serde::Serialize;

use crate::error::CliError;

/// Settings from `config_path`, or the defaults when none was given
pub fn load_settings(config_path: Option<&Path>) -> Result<ExporterSettings, CliError> {
    match config_path {
        Some(path) => Ok(ExporterSettings::load(path)?),
        None => Ok(ExporterSettings::default()),
    }
}

/// Reads and validates the credentials file
pub fn load_credentials(path: &Path) -> Result<Credentials, CliError> {
    Ok(Credentials::load(path)?)
}

/// Initialises logging from `-v` and the `[logging]` section
///
/// `quiet` limits output to errors unless `-v` was also given.
pub fn init_logging(settings: &ExporterSettings, verbose: u8, quiet: bool) -> Result<(), CliError> {
    let configured: TracingLevel = settings.logging.level.parse()?;
    let base = if quiet { TracingLevel::Error } else { configured };
    let mut config = TracingConfig::new().with_level(TracingLevel::from_verbosity(verbose, base));

    if let Some(ref file) = settings.logging.file {
        config = config.with_output(TracingOutput::File {
            path: PathBuf::from(file),
        });
    }
    if verbose == 0
        && let Some(ref filter) = settings.logging.filter
    {
        config = config.with_filter(filter.clone());
    }

    init_tracing(&config)?;
    Ok(())
}

/// Opens the chassis shell session
pub async fn connect_session(
    settings: &ExporterSettings,
    creds: &Credentials,
) -> Result<Arc<SessionManager<OpenSshConnector>>, CliError> {
    let connector = OpenSshConnector::new(creds.ssh_target()?, settings.host_key_policy)
        .with_connect_timeout(settings.effective_connect_timeout())
        .with_command_timeout(settings.effective_command_timeout());
    let session = Arc::new(SessionManager::new(connector));
    session
        .connect()
        .await
        .map_err(|e| CliError::Connection(e.to_string()))?;
    Ok(session)
}

/// Chassis client over `session` using the configured controller time zone
pub fn build_client(
    settings: &ExporterSettings,
    session: Arc<SessionManager<OpenSshConnector>>,
) -> Result<ChassisClient<OpenSshConnector>, CliError> {
    Ok(ChassisClient::new(session, settings.parse_context()?))
}

/// Sideband client for the blade BMCs
pub fn ipmi_client(creds: &IpmiCredentials) -> IpmiToolClient {
    IpmiToolClient::new(creds.user.clone(), creds.password.clone())
}

/// Creates the async runtime the command handlers block on
pub fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::Config(format!("Failed to create async runtime: {e}")))
}

/// Pretty-prints `value` as JSON on stdout
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::Config(format!("Failed to serialize output: {e}")))?;
    println!("{json}");
    Ok(())
}
