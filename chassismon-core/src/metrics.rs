//! Exported gauge families and the sinks that hold them
//!
//! The poller only ever sets, deletes or resets label sets through
//! [`MetricSink`]. [`PrometheusSink`] backs the `/metrics` endpoint;
//! [`MemorySink`] keeps plain values for one-shot snapshots and tests.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Mutex, PoisonError};

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use serde::Serialize;

/// Errors raised by a metric sink
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Label values do not match the family's label names
    #[error("{family} takes {expected} label values, got {actual}")]
    LabelCount {
        /// Metric name
        family: &'static str,
        /// Number of label names
        expected: usize,
        /// Number of values given
        actual: usize,
    },
    /// Registering or gathering failed
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
    /// The text exposition could not be produced
    #[error("failed to encode metrics: {0}")]
    Encode(String),
}

/// Result type for metric operations
pub type MetricsResult<T> = Result<T, MetricsError>;

/// The gauge families the exporter publishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum GaugeFamily {
    /// Chassis ambient temperature sensors
    AmbientTemp,
    /// Chassis fan speeds
    FanRpm,
    /// Inlet temperature of each powered-on blade
    BladeTemp,
}

impl GaugeFamily {
    /// Every family, in exposition order
    pub const ALL: [Self; 3] = [Self::AmbientTemp, Self::FanRpm, Self::BladeTemp];

    /// Metric name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AmbientTemp => "m1000e_ambient_temp_celsius",
            Self::FanRpm => "m1000e_fan_rpm",
            Self::BladeTemp => "m1000e_server_temp_celsius",
        }
    }

    /// Help text
    #[must_use]
    pub const fn help(self) -> &'static str {
        match self {
            Self::AmbientTemp => "Ambient temperature reported by the chassis, in degrees Celsius",
            Self::FanRpm => "Chassis fan speed in revolutions per minute",
            Self::BladeTemp => "Ambient temperature reported by a blade's BMC, in degrees Celsius",
        }
    }

    /// Label names, in the order values must be given
    #[must_use]
    pub const fn label_names(self) -> &'static [&'static str] {
        match self {
            Self::AmbientTemp | Self::FanRpm => &["number", "name", "status"],
            Self::BladeTemp => &["slot_number", "name", "power_state", "blade_type"],
        }
    }

    fn check(self, labels: &[String]) -> MetricsResult<()> {
        let expected = self.label_names().len();
        if labels.len() == expected {
            Ok(())
        } else {
            Err(MetricsError::LabelCount {
                family: self.name(),
                expected,
                actual: labels.len(),
            })
        }
    }
}

impl fmt::Display for GaugeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Destination for finished readings.
///
/// `delete` and `reset` are idempotent: removing an absent label set is not
/// an error.
pub trait MetricSink: Send + Sync {
    /// Sets the gauge for `labels` to `value`
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::LabelCount`] if `labels` does not match the
    /// family.
    fn set(&self, family: GaugeFamily, labels: &[String], value: f64) -> MetricsResult<()>;

    /// Removes the gauge for `labels`; returns whether one was present
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::LabelCount`] if `labels` does not match the
    /// family.
    fn delete(&self, family: GaugeFamily, labels: &[String]) -> MetricsResult<bool>;

    /// Removes every label set of `family`
    fn reset(&self, family: GaugeFamily);
}

/// Registry-backed sink served on `/metrics`
pub struct PrometheusSink {
    registry: Registry,
    gauges: HashMap<GaugeFamily, GaugeVec>,
}

impl PrometheusSink {
    /// Creates a sink with its own registry
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Prometheus`] if a family fails to register.
    pub fn new() -> MetricsResult<Self> {
        Self::with_registry(Registry::new())
    }

    /// Registers the gauge families in `registry`
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Prometheus`] if a family fails to register,
    /// e.g. because the registry already holds it.
    pub fn with_registry(registry: Registry) -> MetricsResult<Self> {
        let mut gauges = HashMap::new();
        for family in GaugeFamily::ALL {
            let vec = GaugeVec::new(Opts::new(family.name(), family.help()), family.label_names())?;
            registry.register(Box::new(vec.clone()))?;
            gauges.insert(family, vec);
        }
        Ok(Self { registry, gauges })
    }

    /// The registry the families live in
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Renders the registry in the Prometheus text format
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Encode`] if encoding fails.
    pub fn encode(&self) -> MetricsResult<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| MetricsError::Encode(e.to_string()))
    }

    fn gauge(&self, family: GaugeFamily) -> Option<&GaugeVec> {
        self.gauges.get(&family)
    }
}

impl MetricSink for PrometheusSink {
    fn set(&self, family: GaugeFamily, labels: &[String], value: f64) -> MetricsResult<()> {
        family.check(labels)?;
        if let Some(vec) = self.gauge(family) {
            let values: Vec<&str> = labels.iter().map(String::as_str).collect();
            vec.with_label_values(values.as_slice()).set(value);
        }
        Ok(())
    }

    fn delete(&self, family: GaugeFamily, labels: &[String]) -> MetricsResult<bool> {
        family.check(labels)?;
        let Some(vec) = self.gauge(family) else {
            return Ok(false);
        };
        let values: Vec<&str> = labels.iter().map(String::as_str).collect();
        Ok(vec.remove_label_values(values.as_slice()).is_ok())
    }

    fn reset(&self, family: GaugeFamily) {
        if let Some(vec) = self.gauge(family) {
            vec.reset();
        }
    }
}

/// One exported value, as printed by snapshots
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    /// Metric name
    pub metric: &'static str,
    /// Label name to value
    pub labels: BTreeMap<&'static str, String>,
    /// Gauge value
    pub value: f64,
}

/// In-process sink
#[derive(Debug, Default)]
pub struct MemorySink {
    values: Mutex<BTreeMap<(GaugeFamily, Vec<String>), f64>>,
}

impl MemorySink {
    /// Creates an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, BTreeMap<(GaugeFamily, Vec<String>), f64>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current value for `labels`
    #[must_use]
    pub fn get(&self, family: GaugeFamily, labels: &[&str]) -> Option<f64> {
        let key = (family, labels.iter().map(|s| (*s).to_string()).collect());
        self.values().get(&key).copied()
    }

    /// Number of label sets held for `family`
    #[must_use]
    pub fn len(&self, family: GaugeFamily) -> usize {
        self.values().keys().filter(|(f, _)| *f == family).count()
    }

    /// Whether no family holds any value
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }

    /// Every value, ordered by family then labels
    #[must_use]
    pub fn observations(&self) -> Vec<Observation> {
        self.values()
            .iter()
            .map(|((family, labels), value)| Observation {
                metric: family.name(),
                labels: family
                    .label_names()
                    .iter()
                    .copied()
                    .zip(labels.iter().cloned())
                    .collect(),
                value: *value,
            })
            .collect()
    }
}

impl MetricSink for MemorySink {
    fn set(&self, family: GaugeFamily, labels: &[String], value: f64) -> MetricsResult<()> {
        family.check(labels)?;
        self.values().insert((family, labels.to_vec()), value);
        Ok(())
    }

    fn delete(&self, family: GaugeFamily, labels: &[String]) -> MetricsResult<bool> {
        family.check(labels)?;
        Ok(self.values().remove(&(family, labels.to_vec())).is_some())
    }

    fn reset(&self, family: GaugeFamily) {
        self.values().retain(|(f, _), _| *f != family);
    }
}
