//! `chassismon` Core Library
//!
//! This crate turns the text output of a blade chassis controller into
//! typed records and keeps a Prometheus gauge set in step with it.
//!
//! # Crate Structure
//!
//! - [`parser`] - Schema-driven line parser (tokenizers, extractors, scalar conversions)
//! - [`schema`] - Record types and parse tables for each `racadm` command
//! - [`session`] - Long-lived SSH session with scheduled replacement
//! - [`chassis`] - Typed chassis commands over a session
//! - [`sideband`] - Blade temperature reads over IPMI
//! - [`metrics`] - Gauge families and sinks
//! - [`poller`] - Periodic snapshot orchestration
//! - [`config`] - Exporter settings and credentials
//! - [`tracing`] - Subscriber setup and span names

// Enable missing_docs warning for public API documentation
#![warn(missing_docs)]

pub mod chassis;
pub mod config;
pub mod error;
pub mod metrics;
pub mod parser;
pub mod poller;
pub mod schema;
pub mod session;
pub mod sideband;
pub mod tracing;

pub use chassis::{ChassisClient, ChassisSource};
pub use config::{ConfigError, ConfigResult, Credentials, ExporterSettings, IpmiCredentials};
pub use error::{ChassisError, ChassisResult};
pub use metrics::{
    GaugeFamily, MemorySink, MetricSink, MetricsError, Observation, PrometheusSink,
};
pub use parser::{ParseConfig, ParseContext, ParseError, parse_output};
pub use poller::{
    AddressCache, CycleSummary, PhaseSummary, Poller, PollerHandle, PollerSettings, start_poller,
};
pub use session::{
    Connector, HostKeyPolicy, OpenSshConnector, SessionManager, SshTarget, Transport,
    TransportError, spawn_refresh,
};
pub use sideband::{IpmiToolClient, SidebandError, SidebandSensors};
pub use tracing::{TracingConfig, TracingError, TracingLevel, TracingOutput, init_tracing};
