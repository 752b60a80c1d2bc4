//! One-shot chassis commands printed as JSON.

use std::sync::Arc;

use chassismon_core::{Credentials, ExporterSettings};

use crate::error::CliError;
use crate::util::{build_client, connect_session, print_json};

/// Which chassis record to print
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowTarget {
    /// `getsysinfo`
    SysInfo,
    /// `getsensorinfo`
    Sensors,
    /// `getpbinfo`
    PowerBudget,
    /// `getniccfg` for a slot
    Nic(u32),
}

/// Show command handler
pub async fn cmd_show(
    settings: &ExporterSettings,
    creds: &Credentials,
    target: ShowTarget,
) -> Result<(), CliError> {
    let session = connect_session(settings, creds).await?;
    let client = build_client(settings, Arc::clone(&session))?;

    let result = match target {
        ShowTarget::SysInfo => client
            .get_sys_info()
            .await
            .map_err(CliError::from)
            .and_then(|r| print_json(&r)),
        ShowTarget::Sensors => client
            .get_sensor_info()
            .await
            .map_err(CliError::from)
            .and_then(|r| print_json(&r)),
        ShowTarget::PowerBudget => client
            .get_power_budget_info()
            .await
            .map_err(CliError::from)
            .and_then(|r| print_json(&r)),
        ShowTarget::Nic(slot) => client
            .get_nic_config(slot)
            .await
            .map_err(CliError::from)
            .and_then(|r| print_json(&r)),
    };

    if let Err(e) = session.close().await {
        tracing::warn!(error = %e, "Failed to close chassis session");
    }
    result
}
