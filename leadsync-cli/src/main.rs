//! leadsync: two-way sync between a lead sheet and a task board.
//!
//! # Usage
//!
//! ```text
//! leadsync sync [--direction both|leads-to-tasks|tasks-to-leads] [--dry-run] [--json] [--verbose]
//!               [--config PATH | --fixture FILE]
//! leadsync check [--config PATH]
//! leadsync normalize <STATUS>... [--policy default-to-new|reject] [--json]
//! leadsync daemon start|stop|status|sync|logs
//! ```

mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    check::CheckArgs, daemon::DaemonCommand, normalize::NormalizeArgs, sync::SyncArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "leadsync",
    version,
    about = "Keep a lead sheet and a task board in step",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one reconciliation pass and print the report.
    Sync(SyncArgs),

    /// Validate configuration and print it with secrets redacted.
    Check(CheckArgs),

    /// Show the canonical status for raw status strings.
    Normalize(NormalizeArgs),

    /// Manage the scheduler daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Sync(args) => args.run(),
        Commands::Check(args) => args.run().map(|()| ExitCode::SUCCESS),
        Commands::Normalize(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command).map(|()| ExitCode::SUCCESS),
    }
}
