//! Transport abstraction underneath the session manager

use async_trait::async_trait;

/// Errors raised by a remote shell transport
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// No transport has been established yet
    #[error("not connected")]
    NotConnected,
    /// The transport was closed and can no longer run commands
    #[error("transport is closed")]
    Closed,
    /// Establishing or authenticating the connection failed
    #[error("failed to connect to {target}: {reason}")]
    Connect {
        /// `user@host:port` being connected to
        target: String,
        /// Failure description
        reason: String,
    },
    /// The command could not be started or its output not collected
    #[error("failed to run `{command}`: {reason}")]
    Exec {
        /// Remote command line
        command: String,
        /// Failure description
        reason: String,
    },
    /// The remote command exited unsuccessfully
    #[error("`{command}` exited with {status}: {stderr}")]
    ExitStatus {
        /// Remote command line
        command: String,
        /// Exit status as reported by the local process
        status: String,
        /// Trimmed standard error
        stderr: String,
    },
    /// The command did not finish in time
    #[error("`{command}` timed out after {secs}s")]
    Timeout {
        /// Remote command line
        command: String,
        /// Timeout that elapsed
        secs: u64,
    },
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// An authenticated connection able to run remote commands
#[async_trait]
pub trait Transport: Send + Sync {
    /// Runs `command` to completion and returns its standard output.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be started, exits with a
    /// non-zero status, or the transport is closed.
    async fn exec(&self, command: &str) -> TransportResult<Vec<u8>>;

    /// Tears the connection down. Further `exec` calls fail with
    /// [`TransportError::Closed`].
    ///
    /// # Errors
    ///
    /// Returns an error if teardown could not complete cleanly.
    async fn close(&self) -> TransportResult<()>;
}

/// Opens fresh transports to one fixed target
#[async_trait]
pub trait Connector: Send + Sync {
    /// Transport type produced by [`Connector::connect`]
    type Transport: Transport + 'static;

    /// Establishes and authenticates a new transport.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connect`] on failure.
    async fn connect(&self) -> TransportResult<Self::Transport>;

    /// Human-readable target for logs
    fn target(&self) -> String;
}
