//! CLI argument parsing types using `clap`.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Blade chassis telemetry exporter
#[derive(Parser)]
#[command(name = "chassismon")]
#[command(author, version, about = "Blade chassis telemetry exporter")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the exporter settings file (TOML)
    #[arg(short, long, global = true, env = "CHASSISMON_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the credentials file (JSON)
    #[arg(
        long,
        global = true,
        env = "CHASSISMON_CREDENTIALS",
        default_value = "credentials.json"
    )]
    pub credentials: PathBuf,

    /// Increase output verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Print `racadm getsysinfo` as JSON
    #[command(about = "Show chassis and controller information")]
    Sysinfo,

    /// Print `racadm getsensorinfo` as JSON
    #[command(about = "Show fan, temperature, supply and cable sensors")]
    Sensors,

    /// Print `racadm getpbinfo` as JSON
    #[command(about = "Show per-slot power allocation")]
    Power,

    /// Print `racadm getniccfg` for one blade as JSON
    #[command(about = "Show the management NIC of a blade")]
    Nic {
        /// Chassis slot number
        #[arg(short, long)]
        slot: u32,
    },

    /// Read one BMC's ambient temperature
    #[command(about = "Read a blade's ambient temperature over IPMI")]
    IpmiTemp {
        /// BMC address
        host: IpAddr,

        /// BMC port (defaults to the `ipmi_port` setting)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one poll cycle and print what it would export
    #[command(about = "Run a single poll cycle and print the readings")]
    Snapshot,

    /// Run the exporter
    #[command(about = "Poll the chassis and serve /metrics until interrupted")]
    Serve,
}
