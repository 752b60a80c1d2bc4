//! Periodic chassis snapshots turned into gauge updates
//!
//! Each cycle has two independent phases. The sensor phase exports fan and
//! ambient readings from `racadm getsensorinfo`; the blade phase reads the
//! inlet temperature of every powered-on blade over IPMI. A failed command
//! clears the whole phase's families, while a bad record only removes its
//! own label set. After a successful command, label sets exported by an
//! earlier cycle but absent from this one are removed, so a sensor whose
//! status changes never leaves its old series behind.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::chassis::ChassisSource;
use crate::config::ExporterSettings;
use crate::error::{ChassisError, ChassisResult};
use crate::metrics::{GaugeFamily, MetricSink};
use crate::schema::{Sensor, ServerPower, power_budget::POWER_STATE_ON};
use crate::sideband::{DEFAULT_IPMI_PORT, SidebandSensors};
use crate::tracing::span_names;

/// What the poller validates and where it reads blades
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerSettings {
    /// Unit ambient rows must carry
    pub ambient_unit: String,
    /// Unit fan rows must carry
    pub fan_unit: String,
    /// Blade BMC port
    pub ipmi_port: u16,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            ambient_unit: "Celsius".to_string(),
            fan_unit: "rpm".to_string(),
            ipmi_port: DEFAULT_IPMI_PORT,
        }
    }
}

impl From<&ExporterSettings> for PollerSettings {
    fn from(settings: &ExporterSettings) -> Self {
        Self {
            ambient_unit: settings.ambient_unit.clone(),
            fan_unit: settings.fan_unit.clone(),
            ipmi_port: settings.ipmi_port,
        }
    }
}

/// Server name to management address, filled on first sight of a blade.
///
/// Entries never expire. A blade whose iDRAC address changes (DHCP renewal,
/// moved to another slot under the same name) keeps being read at the old
/// address until the process restarts; sideband failures for it then show
/// up as a missing gauge rather than a wrong one.
#[derive(Debug, Default)]
pub struct AddressCache {
    entries: Mutex<HashMap<String, IpAddr>>,
}

impl AddressCache {
    /// Creates an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, IpAddr>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached address for `server_name`
    #[must_use]
    pub fn get(&self, server_name: &str) -> Option<IpAddr> {
        self.entries().get(server_name).copied()
    }

    /// Records the address of `server_name`
    pub fn insert(&self, server_name: impl Into<String>, addr: IpAddr) {
        self.entries().insert(server_name.into(), addr);
    }

    /// Number of cached blades
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether no blade has been resolved yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

/// Outcome of one phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhaseSummary {
    /// Label sets set to a fresh value
    pub published: usize,
    /// Records rejected; their label sets were deleted
    pub rejected: usize,
    /// Records deliberately not read (blades not powered on)
    pub skipped: usize,
    /// Label sets from earlier cycles that this cycle no longer reports
    pub pruned: usize,
    /// The phase command failed and its families were cleared
    pub command_failed: bool,
}

/// Outcome of one poll cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    /// Fan and ambient phase
    pub sensors: PhaseSummary,
    /// Blade temperature phase
    pub blades: PhaseSummary,
}

fn sensor_labels(sensor: &Sensor) -> Vec<String> {
    vec![
        sensor.number.to_string(),
        sensor.name.clone(),
        sensor.status.clone(),
    ]
}

fn blade_labels(server: &ServerPower, power_state: &str) -> Vec<String> {
    vec![
        server.slot_number.to_string(),
        server.server_name.clone(),
        power_state.to_string(),
        server.blade_type.clone(),
    ]
}

/// Label sets published during one phase, per family
type Published = HashMap<GaugeFamily, HashSet<Vec<String>>>;

/// Snapshot orchestrator
pub struct Poller<S, B, M> {
    chassis: S,
    sideband: B,
    sink: Arc<M>,
    settings: PollerSettings,
    addresses: AddressCache,
    exported: Mutex<Published>,
}

impl<S, B, M> Poller<S, B, M>
where
    S: ChassisSource,
    B: SidebandSensors,
    M: MetricSink,
{
    /// Creates a poller publishing into `sink`
    pub fn new(chassis: S, sideband: B, sink: Arc<M>, settings: PollerSettings) -> Self {
        Self {
            chassis,
            sideband,
            sink,
            settings,
            addresses: AddressCache::new(),
            exported: Mutex::new(HashMap::new()),
        }
    }

    /// The chassis data source
    pub const fn chassis(&self) -> &S {
        &self.chassis
    }

    /// The sink readings are published to
    pub fn sink(&self) -> &Arc<M> {
        &self.sink
    }

    /// Blade addresses resolved so far
    pub const fn addresses(&self) -> &AddressCache {
        &self.addresses
    }

    /// Runs both phases once
    pub async fn poll_once(&self) -> CycleSummary {
        let sensors = self
            .poll_sensors()
            .instrument(crate::trace_operation!(span_names::POLL_SENSORS))
            .await;
        let blades = self
            .poll_blades()
            .instrument(crate::trace_operation!(span_names::POLL_BLADES))
            .await;
        CycleSummary { sensors, blades }
    }

    async fn poll_sensors(&self) -> PhaseSummary {
        let mut summary = PhaseSummary::default();
        let info = match self.chassis.sensor_info().await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    transport = e.is_transport(),
                    "Failed to load sensor info, clearing chassis gauges"
                );
                self.clear(GaugeFamily::AmbientTemp);
                self.clear(GaugeFamily::FanRpm);
                summary.command_failed = true;
                return summary;
            }
        };

        let mut published = Published::new();
        for sensor in &info.ambient_temp {
            self.publish_sensor(
                GaugeFamily::AmbientTemp,
                &self.settings.ambient_unit,
                sensor,
                &mut published,
                &mut summary,
            );
        }
        for sensor in &info.fans {
            self.publish_sensor(
                GaugeFamily::FanRpm,
                &self.settings.fan_unit,
                sensor,
                &mut published,
                &mut summary,
            );
        }
        for family in [GaugeFamily::AmbientTemp, GaugeFamily::FanRpm] {
            let current = published.remove(&family).unwrap_or_default();
            summary.pruned += self.prune(family, current);
        }
        summary
    }

    fn publish_sensor(
        &self,
        family: GaugeFamily,
        expected_unit: &str,
        sensor: &Sensor,
        published: &mut Published,
        summary: &mut PhaseSummary,
    ) {
        let labels = sensor_labels(sensor);
        if sensor.units != expected_unit {
            tracing::warn!(
                metric = %family,
                number = sensor.number,
                name = %sensor.name,
                units = %sensor.units,
                expected = expected_unit,
                "Unexpected sensor units, skipping"
            );
            self.delete(family, &labels);
            summary.rejected += 1;
            return;
        }
        match self.sink.set(family, &labels, sensor.reading as f64) {
            Ok(()) => {
                published.entry(family).or_default().insert(labels);
                summary.published += 1;
            }
            Err(e) => {
                tracing::warn!(metric = %family, error = %e, "Failed to publish reading");
                summary.rejected += 1;
            }
        }
    }

    async fn poll_blades(&self) -> PhaseSummary {
        let mut summary = PhaseSummary::default();
        let budget = match self.chassis.power_budget_info().await {
            Ok(budget) => budget,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    transport = e.is_transport(),
                    "Failed to load power budget info, clearing blade gauges"
                );
                self.clear(GaugeFamily::BladeTemp);
                summary.command_failed = true;
                return summary;
            }
        };

        let mut published = HashSet::new();
        for server in &budget.servers {
            if !server.is_on() {
                // Drop whatever was exported while it was still on
                self.delete(GaugeFamily::BladeTemp, &blade_labels(server, POWER_STATE_ON));
                summary.skipped += 1;
                continue;
            }

            let labels = blade_labels(server, &server.power_state);
            match self.blade_temperature(server).await {
                Ok(celsius) => match self.sink.set(GaugeFamily::BladeTemp, &labels, celsius) {
                    Ok(()) => {
                        published.insert(labels);
                        summary.published += 1;
                    }
                    Err(e) => {
                        tracing::warn!(slot = server.slot_number, error = %e, "Failed to publish reading");
                        summary.rejected += 1;
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        slot = server.slot_number,
                        name = %server.server_name,
                        error = %e,
                        "Failed to read blade temperature"
                    );
                    self.delete(GaugeFamily::BladeTemp, &labels);
                    summary.rejected += 1;
                }
            }
        }
        summary.pruned = self.prune(GaugeFamily::BladeTemp, published);
        summary
    }

    async fn blade_temperature(&self, server: &ServerPower) -> ChassisResult<f64> {
        let addr = self.resolve(server).await?;
        Ok(self
            .sideband
            .ambient_temperature(addr, self.settings.ipmi_port)
            .await?)
    }

    async fn resolve(&self, server: &ServerPower) -> ChassisResult<IpAddr> {
        if let Some(addr) = self.addresses.get(&server.server_name) {
            return Ok(addr);
        }
        tracing::info!(
            slot = server.slot_number,
            name = %server.server_name,
            "Looking up iDRAC address"
        );
        let nic = self.chassis.nic_config(server.slot_number).await?;
        let addr = nic.ip_address.ok_or_else(|| ChassisError::Unresolved {
            slot: server.slot_number,
        })?;
        self.addresses.insert(server.server_name.clone(), addr);
        Ok(addr)
    }

    fn exported(&self) -> std::sync::MutexGuard<'_, Published> {
        self.exported.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deletes label sets of `family` exported last cycle but not in `current`
    fn prune(&self, family: GaugeFamily, current: HashSet<Vec<String>>) -> usize {
        let stale: Vec<Vec<String>> = {
            let mut exported = self.exported();
            let stale = exported
                .get(&family)
                .map(|previous| previous.difference(&current).cloned().collect())
                .unwrap_or_default();
            exported.insert(family, current);
            stale
        };
        for labels in &stale {
            tracing::debug!(metric = %family, labels = ?labels, "Label set no longer reported");
            self.delete(family, labels);
        }
        stale.len()
    }

    fn clear(&self, family: GaugeFamily) {
        self.sink.reset(family);
        self.exported().remove(&family);
    }

    fn delete(&self, family: GaugeFamily, labels: &[String]) {
        if let Err(e) = self.sink.delete(family, labels) {
            tracing::warn!(metric = %family, error = %e, "Failed to delete label set");
        }
    }
}

/// Handle to a running poll loop
#[derive(Debug)]
pub struct PollerHandle {
    stop_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Stops the loop; a cycle in progress runs to completion first
    pub async fn stop(self) {
        let _ = self.stop_tx.send(()).await;
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Poller task ended abnormally");
        }
    }
}

/// Polls immediately, then every `interval`
pub fn start_poller<S, B, M>(poller: Arc<Poller<S, B, M>>, interval: Duration) -> PollerHandle
where
    S: ChassisSource + 'static,
    B: SidebandSensors + 'static,
    M: MetricSink + 'static,
{
    let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut cycle: u64 = 0;

        loop {
            tokio::select! {
                _ = stop_rx.recv() => break,
                _ = ticker.tick() => {
                    cycle += 1;
                    let span = crate::trace_operation!(span_names::POLL_CYCLE, cycle);
                    let summary = poller.poll_once().instrument(span).await;
                    tracing::debug!(
                        cycle,
                        sensors_published = summary.sensors.published,
                        sensors_rejected = summary.sensors.rejected,
                        blades_published = summary.blades.published,
                        blades_rejected = summary.blades.rejected,
                        blades_skipped = summary.blades.skipped,
                        pruned = summary.sensors.pruned + summary.blades.pruned,
                        "Poll cycle finished"
                    );
                }
            }
        }
        tracing::debug!("Poller stopped");
    });

    PollerHandle { stop_tx, task }
}
