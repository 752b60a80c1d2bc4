//! Long-running exporter: poll loop, session refresh and `/metrics`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use chassismon_core::{
    Credentials, ExporterSettings, Poller, PollerSettings, PrometheusSink, spawn_refresh,
    start_poller,
};
use tokio::signal;

use crate::error::CliError;
use crate::util::{build_client, connect_session, ipmi_client};

/// Content type of the Prometheus text exposition format
const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Builds the HTTP app serving `sink`
fn router(sink: Arc<PrometheusSink>) -> Router {
    Router::new().route("/metrics", get(metrics)).with_state(sink)
}

async fn metrics(State(sink): State<Arc<PrometheusSink>>) -> Response {
    match sink.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Serve command handler
pub async fn cmd_serve(settings: &ExporterSettings, creds: &Credentials) -> Result<(), CliError> {
    let listen = settings.listen_socket()?;
    let sink = Arc::new(PrometheusSink::new()?);

    let session = connect_session(settings, creds).await?;
    let client = build_client(settings, Arc::clone(&session))?;
    let sys_info = match client.get_sys_info().await {
        Ok(info) => info,
        Err(e) => {
            if let Err(close_err) = session.close().await {
                tracing::warn!(error = %close_err, "Failed to close chassis session");
            }
            return Err(e.into());
        }
    };
    tracing::info!(
        chassis = %sys_info.chassis_name,
        target = %session.target(),
        "Connected to chassis"
    );

    let sideband = Arc::new(ipmi_client(&creds.ipmi));
    let poller = Arc::new(Poller::new(
        client,
        Arc::clone(&sideband),
        Arc::clone(&sink),
        PollerSettings::from(settings),
    ));

    let refresh = spawn_refresh(Arc::clone(&session), settings.effective_session_refresh());
    let polling = start_poller(poller, settings.effective_poll_interval());

    let served = serve_until_interrupted(listen, router(sink)).await;

    polling.stop().await;
    refresh.stop().await;
    if let Err(e) = session.close().await {
        tracing::warn!(error = %e, "Failed to close chassis session");
    }
    sideband.close().await;
    tracing::info!("Exporter stopped");

    served
}

async fn serve_until_interrupted(listen: SocketAddr, app: Router) -> Result<(), CliError> {
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| CliError::Server(format!("Failed to bind {listen}: {e}")))?;
    tracing::info!(addr = %listen, "Serving /metrics");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                return;
            }
            tracing::info!("Shutdown requested");
        })
        .await
        .map_err(|e| CliError::Server(e.to_string()))
}
