//! Single sideband temperature read.

use std::net::IpAddr;

use chassismon_core::{Credentials, ExporterSettings, SidebandSensors};

use crate::error::CliError;
use crate::util::ipmi_client;

/// IPMI temperature command handler
pub async fn cmd_ipmi_temp(
    settings: &ExporterSettings,
    creds: &Credentials,
    host: IpAddr,
    port: Option<u16>,
) -> Result<(), CliError> {
    let client = ipmi_client(&creds.ipmi);
    let port = port.unwrap_or(settings.ipmi_port);

    let result = client.ambient_temperature(host, port).await;
    client.close().await;

    let celsius = result?;
    println!("{host}: {celsius} degrees C");
    Ok(())
}
