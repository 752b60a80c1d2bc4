//! Session manager with scheduled transport replacement

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;

use tracing::Instrument;

use super::transport::{Connector, Transport, TransportError, TransportResult};
use crate::tracing::span_names;

/// Default interval between transport replacements
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(25 * 60);

/// The transport currently handed to readers
struct Session<T> {
    transport: T,
    generation: u64,
    connected_at: DateTime<Utc>,
}

/// Owns one authenticated transport and replaces it on demand.
///
/// Commands hold a shared lock for their whole run, so any number of them
/// proceed concurrently on the same transport. Connecting, refreshing and
/// closing take the exclusive lock: they wait for running commands to
/// finish, and commands issued meanwhile queue until the swap is done.
pub struct SessionManager<C: Connector> {
    connector: C,
    active: RwLock<Option<Session<C::Transport>>>,
    generations: AtomicU64,
}

impl<C: Connector> SessionManager<C> {
    /// Creates a manager with no transport; call [`Self::connect`] first
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            active: RwLock::new(None),
            generations: AtomicU64::new(0),
        }
    }

    /// Closes any existing transport and opens a new one.
    ///
    /// If opening fails the previous transport (now closed) stays in place,
    /// so subsequent commands report the failure.
    ///
    /// # Errors
    ///
    /// Returns the connector's error.
    pub async fn connect(&self) -> TransportResult<()> {
        let mut slot = self.active.write().await;

        if let Some(old) = slot.as_ref()
            && let Err(e) = old.transport.close().await
        {
            tracing::warn!(
                generation = old.generation,
                error = %e,
                "Failed to close previous chassis transport"
            );
        }

        let transport = self.connector.connect().await?;
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(
            target_host = %self.connector.target(),
            generation,
            "Chassis session connected"
        );
        *slot = Some(Session {
            transport,
            generation,
            connected_at: Utc::now(),
        });
        Ok(())
    }

    /// Replaces the transport, logging instead of failing.
    ///
    /// Returns whether a new transport is now active.
    pub async fn refresh(&self) -> bool {
        match self.connect().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    target_host = %self.connector.target(),
                    error = %e,
                    "Session refresh failed, keeping previous transport"
                );
                false
            }
        }
    }

    /// Runs `command` and hands its complete standard output to `consume`.
    ///
    /// The shared lock is held until the remote process has exited, so a
    /// refresh never tears down a transport under a running command.
    ///
    /// Output is buffered in memory in full before `consume` runs; nothing
    /// is streamed. `racadm` replies are a few kilobytes, and every parser
    /// needs the whole reply before it can validate it.
    ///
    /// # Errors
    ///
    /// Returns transport errors converted into `E`, or whatever `consume`
    /// returns.
    pub async fn run_command<T, E, F>(&self, command: &str, consume: F) -> Result<T, E>
    where
        F: FnOnce(&[u8]) -> Result<T, E>,
        E: From<TransportError>,
    {
        let output = {
            let guard = self.active.read().await;
            let session = guard.as_ref().ok_or(TransportError::NotConnected)?;
            tracing::debug!(command, generation = session.generation, "Running chassis command");
            session.transport.exec(command).await?
        };
        consume(&output)
    }

    /// Closes and forgets the active transport
    ///
    /// # Errors
    ///
    /// Returns the transport's close error; the transport is dropped either way.
    pub async fn close(&self) -> TransportResult<()> {
        let Some(session) = self.active.write().await.take() else {
            return Ok(());
        };
        tracing::info!(generation = session.generation, "Chassis session closed");
        session.transport.close().await
    }

    /// Number of transports opened so far; the active one has this number
    pub fn generation(&self) -> u64 {
        self.generations.load(Ordering::Relaxed)
    }

    /// When the active transport was opened
    pub async fn connected_at(&self) -> Option<DateTime<Utc>> {
        self.active.read().await.as_ref().map(|s| s.connected_at)
    }

    /// Target description from the connector
    pub fn target(&self) -> String {
        self.connector.target()
    }
}

/// Handle to a running refresh task
#[derive(Debug)]
pub struct RefreshHandle {
    stop_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Stops the task and waits for a refresh in progress to finish
    pub async fn stop(self) {
        let _ = self.stop_tx.send(()).await;
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Session refresh task ended abnormally");
        }
    }
}

/// Starts a task that calls [`SessionManager::refresh`] every `interval`.
///
/// The first refresh happens one full interval after the call.
pub fn spawn_refresh<C>(manager: Arc<SessionManager<C>>, interval: Duration) -> RefreshHandle
where
    C: Connector + 'static,
{
    let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);

    let task = tokio::spawn(async move {
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = stop_rx.recv() => break,
                _ = ticker.tick() => {
                    let span = crate::trace_operation!(
                        span_names::SESSION_REFRESH,
                        previous = manager.generation()
                    );
                    if manager.refresh().instrument(span).await {
                        tracing::info!(
                            generation = manager.generation(),
                            "Chassis session refreshed"
                        );
                    }
                }
            }
        }
        tracing::debug!("Session refresh task stopped");
    });

    RefreshHandle { stop_tx, task }
}
