//! OpenSSH transport multiplexed over a ControlMaster socket
//!
//! [`OpenSshConnector::connect`] starts one long-running `ssh -M -N` master
//! process that authenticates once (through `sshpass -e` when a password is
//! configured). Every command then runs as a short-lived `ssh -S <socket>`
//! client that reuses the master's authenticated connection, so concurrent
//! commands share one login and closing the master ends the session.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::transport::{Connector, Transport, TransportError, TransportResult};

/// Default SSH port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// How often the master socket is probed while connecting
const MASTER_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How the server's host key is verified.
///
/// Chassis controllers regenerate their keys on firmware resets and are
/// reached over a management LAN, so the default accepts any key. That is
/// insecure against an active attacker on that network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostKeyPolicy {
    /// Accept any host key and remember none (insecure)
    #[default]
    AcceptAny,
    /// Require the key to be present in the user's `known_hosts`
    KnownHosts,
}

impl HostKeyPolicy {
    /// `-o` options implementing the policy
    #[must_use]
    pub const fn ssh_options(self) -> &'static [&'static str] {
        match self {
            Self::AcceptAny => &[
                "StrictHostKeyChecking=no",
                "UserKnownHostsFile=/dev/null",
                "LogLevel=ERROR",
            ],
            Self::KnownHosts => &["StrictHostKeyChecking=yes"],
        }
    }

    /// Whether host keys go unchecked
    #[must_use]
    pub const fn is_insecure(self) -> bool {
        matches!(self, Self::AcceptAny)
    }
}

/// Where and as whom to log in
#[derive(Debug, Clone)]
pub struct SshTarget {
    /// Hostname or address
    pub host: String,
    /// SSH port
    pub port: u16,
    /// Login name
    pub user: String,
    /// Password; empty means key-based authentication
    pub password: SecretString,
}

impl SshTarget {
    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

/// Opens [`OpenSshTransport`]s to one target
#[derive(Debug)]
pub struct OpenSshConnector {
    target: SshTarget,
    policy: HostKeyPolicy,
    connect_timeout: Duration,
    command_timeout: Duration,
    control_dir: PathBuf,
}

impl OpenSshConnector {
    /// Creates a connector; control sockets go in the user's runtime
    /// directory, or the temp directory when there is none
    #[must_use]
    pub fn new(target: SshTarget, policy: HostKeyPolicy) -> Self {
        if policy.is_insecure() {
            tracing::warn!(
                host = %target.host,
                "Host key verification disabled for chassis connection"
            );
        }
        Self {
            target,
            policy,
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(60),
            control_dir: dirs::runtime_dir().unwrap_or_else(std::env::temp_dir),
        }
    }

    /// Sets how long authentication may take
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets how long one remote command may run
    #[must_use]
    pub const fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Overrides the directory holding control sockets
    #[must_use]
    pub fn with_control_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.control_dir = dir.into();
        self
    }

    fn master_command(&self, control_path: &Path) -> Command {
        let password = self.target.password.expose_secret();
        let mut cmd = if password.is_empty() {
            let mut cmd = Command::new("ssh");
            cmd.arg("-o").arg("BatchMode=yes");
            cmd
        } else {
            let mut cmd = Command::new("sshpass");
            cmd.arg("-e").arg("ssh");
            cmd.env("SSHPASS", password);
            cmd
        };

        cmd.arg("-M")
            .arg("-N")
            .arg("-S")
            .arg(control_path)
            .arg("-o")
            .arg("ControlPersist=no")
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)))
            .arg("-o")
            .arg("ServerAliveInterval=30");
        for option in self.policy.ssh_options() {
            cmd.arg("-o").arg(option);
        }
        cmd.arg("-p")
            .arg(self.target.port.to_string())
            .arg(self.target.destination())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Waits until the master accepts clients or exits
    async fn await_master(
        &self,
        master: &mut Child,
        control_path: &Path,
    ) -> TransportResult<()> {
        let connect_error = |reason: String| TransportError::Connect {
            target: self.target(),
            reason,
        };
        let deadline = tokio::time::Instant::now() + self.connect_timeout;

        loop {
            if let Some(status) = master
                .try_wait()
                .map_err(|e| connect_error(e.to_string()))?
            {
                let mut stderr = String::new();
                if let Some(mut pipe) = master.stderr.take() {
                    let _ = pipe.read_to_string(&mut stderr).await;
                }
                return Err(connect_error(format!(
                    "ssh exited with {status}: {}",
                    stderr.trim()
                )));
            }

            let check = Command::new("ssh")
                .arg("-S")
                .arg(control_path)
                .arg("-O")
                .arg("check")
                .arg(self.target.destination())
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map_err(|e| connect_error(format!("failed to run ssh: {e}")))?;
            if check.success() {
                return Ok(());
            }

            if tokio::time::Instant::now() >= deadline {
                let _ = master.start_kill();
                return Err(connect_error(format!(
                    "not authenticated after {}s",
                    self.connect_timeout.as_secs()
                )));
            }
            tokio::time::sleep(MASTER_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl Connector for OpenSshConnector {
    type Transport = OpenSshTransport;

    async fn connect(&self) -> TransportResult<OpenSshTransport> {
        let control_path = self
            .control_dir
            .join(format!("chassismon-{}.sock", Uuid::new_v4().simple()));

        let mut master = self
            .master_command(&control_path)
            .spawn()
            .map_err(|e| TransportError::Connect {
                target: self.target(),
                reason: format!("failed to spawn ssh master: {e}"),
            })?;
        self.await_master(&mut master, &control_path).await?;

        tracing::debug!(socket = %control_path.display(), "SSH control master ready");
        Ok(OpenSshTransport {
            control_path,
            destination: self.target.destination(),
            command_timeout: self.command_timeout,
            master: Mutex::new(Some(master)),
            closed: AtomicBool::new(false),
        })
    }

    fn target(&self) -> String {
        format!("{}:{}", self.target.destination(), self.target.port)
    }
}

/// A live ControlMaster connection
#[derive(Debug)]
pub struct OpenSshTransport {
    control_path: PathBuf,
    destination: String,
    command_timeout: Duration,
    master: Mutex<Option<Child>>,
    closed: AtomicBool,
}

impl OpenSshTransport {
    fn control_command(&self) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.arg("-S")
            .arg(&self.control_path)
            .arg("-o")
            .arg("ControlMaster=no")
            .arg("-o")
            .arg("BatchMode=yes");
        cmd
    }
}

#[async_trait]
impl Transport for OpenSshTransport {
    async fn exec(&self, command: &str) -> TransportResult<Vec<u8>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        let mut cmd = self.control_command();
        cmd.arg(&self.destination)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.command_timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(TransportError::Exec {
                    command: command.to_string(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(TransportError::Timeout {
                    command: command.to_string(),
                    secs: self.command_timeout.as_secs(),
                });
            }
        };

        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(TransportError::ExitStatus {
                command: command.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    async fn close(&self) -> TransportResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let exit = self
            .control_command()
            .arg("-O")
            .arg("exit")
            .arg(&self.destination)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        if let Err(e) = exit {
            tracing::debug!(error = %e, "ssh -O exit failed");
        }

        if let Some(mut master) = self.master.lock().await.take() {
            let _ = master.start_kill();
            let _ = master.wait().await;
        }

        match std::fs::remove_file(&self.control_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TransportError::Exec {
                command: "close".to_string(),
                reason: format!("failed to remove {}: {e}", self.control_path.display()),
            }),
        }
    }
}

impl Drop for OpenSshTransport {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.control_path);
    }
}
