//! Command handlers for the CLI.

mod ipmi_temp;
mod serve;
mod show;
mod snapshot;

use std::path::Path;

use crate::cli::Commands;
use crate::error::CliError;
use crate::util::{load_credentials, runtime};

pub use ipmi_temp::cmd_ipmi_temp;
pub use serve::cmd_serve;
pub use show::{ShowTarget, cmd_show};
pub use snapshot::cmd_snapshot;

/// Dispatches the parsed CLI command to the appropriate handler
pub fn dispatch(
    settings: &chassismon_core::ExporterSettings,
    credentials_path: &Path,
    command: Commands,
) -> Result<(), CliError> {
    let creds = load_credentials(credentials_path)?;
    let rt = runtime()?;

    match command {
        Commands::Sysinfo => rt.block_on(cmd_show(settings, &creds, ShowTarget::SysInfo)),
        Commands::Sensors => rt.block_on(cmd_show(settings, &creds, ShowTarget::Sensors)),
        Commands::Power => rt.block_on(cmd_show(settings, &creds, ShowTarget::PowerBudget)),
        Commands::Nic { slot } => rt.block_on(cmd_show(settings, &creds, ShowTarget::Nic(slot))),
        Commands::IpmiTemp { host, port } => {
            rt.block_on(cmd_ipmi_temp(settings, &creds, host, port))
        }
        Commands::Snapshot => rt.block_on(cmd_snapshot(settings, &creds)),
        Commands::Serve => rt.block_on(cmd_serve(settings, &creds)),
    }
}
