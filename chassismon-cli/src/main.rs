//! `chassismon` - blade chassis telemetry exporter
//!
//! Polls a chassis management controller over SSH and the blade BMCs over
//! IPMI, and serves the readings as Prometheus gauges. One-shot commands
//! print individual controller records as JSON.

mod cli;
mod commands;
mod error;
mod util;

use clap::Parser;
use cli::Cli;

use crate::error::CliError;

fn run(cli: Cli) -> Result<(), CliError> {
    let settings = util::load_settings(cli.config.as_deref())?;
    settings.timezone()?;
    util::init_logging(&settings, cli.verbose, cli.quiet)?;
    commands::dispatch(&settings, &cli.credentials, cli.command)
}

fn main() {
    let cli = Cli::parse();
    let quiet = cli.quiet;

    if let Err(e) = run(cli) {
        if !quiet {
            eprintln!("Error: {e}");
        }
        std::process::exit(e.exit_code());
    }
}
