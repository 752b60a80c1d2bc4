//! Chassis shell sessions
//!
//! A [`SessionManager`] owns one authenticated [`Transport`] at a time and
//! replaces it on a schedule so the controller's idle limit never ends a
//! session under a poller. [`openssh`] provides the production transport.

mod manager;
pub mod openssh;
mod transport;

pub use manager::{DEFAULT_REFRESH_INTERVAL, RefreshHandle, SessionManager, spawn_refresh};
pub use openssh::{DEFAULT_SSH_PORT, HostKeyPolicy, OpenSshConnector, OpenSshTransport, SshTarget};
pub use transport::{Connector, Transport, TransportError, TransportResult};
