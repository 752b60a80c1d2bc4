//! One poll cycle into memory, printed as JSON.

use std::sync::Arc;

use chassismon_core::{
    CycleSummary, Credentials, ExporterSettings, MemorySink, Observation, Poller, PollerSettings,
};
use serde::Serialize;

use crate::error::CliError;
use crate::util::{build_client, connect_session, ipmi_client, print_json};

#[derive(Serialize)]
struct Snapshot {
    summary: CycleSummary,
    observations: Vec<Observation>,
}

/// Snapshot command handler
pub async fn cmd_snapshot(
    settings: &ExporterSettings,
    creds: &Credentials,
) -> Result<(), CliError> {
    let session = connect_session(settings, creds).await?;
    let client = build_client(settings, Arc::clone(&session))?;
    let sideband = ipmi_client(&creds.ipmi).with_timeout(settings.effective_connect_timeout());
    let sink = Arc::new(MemorySink::new());

    let poller = Poller::new(
        client,
        sideband,
        Arc::clone(&sink),
        PollerSettings::from(settings),
    );
    let summary = poller.poll_once().await;

    if let Err(e) = session.close().await {
        tracing::warn!(error = %e, "Failed to close chassis session");
    }

    print_json(&Snapshot {
        summary,
        observations: sink.observations(),
    })
}
