//! `leadsync sync`: one reconciliation pass, against the remote services or
//! a YAML fixture.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use leadsync_clients::stores_from_config;
use leadsync_core::memory::MemoryFixture;
use leadsync_core::SyncConfig;
use leadsync_daemon::logging::{env_filter, init_tracing};
use leadsync_daemon::run_interruptible;
use leadsync_sync::{pipeline, SyncDirection, SyncOptions, SyncReport};

/// Exit status of a run interrupted with Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;

/// Arguments for `leadsync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Flows to run: both, leads-to-tasks or tasks-to-leads.
    #[arg(long, default_value_t = SyncDirection::Both)]
    pub direction: SyncDirection,

    /// Compute every change but write nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Config file (defaults to ./leadsync.yaml when present).
    #[arg(long, conflicts_with = "fixture")]
    pub config: Option<PathBuf>,

    /// Sync a YAML fixture (containers, leads, tasks) instead of the remote
    /// services. The fixture is rewritten with the result unless --dry-run.
    #[arg(long)]
    pub fixture: Option<PathBuf>,
}

impl SyncArgs {
    pub fn run(self) -> Result<ExitCode> {
        let report = match &self.fixture {
            Some(path) => self.run_fixture(path)?,
            None => self.run_remote()?,
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to render report JSON")?
            );
        } else {
            print_report(&report);
        }
        Ok(exit_code(&report))
    }

    fn options(&self, base: SyncOptions) -> SyncOptions {
        SyncOptions {
            direction: self.direction,
            dry_run: self.dry_run,
            ..base
        }
    }

    fn run_remote(&self) -> Result<SyncReport> {
        let config = SyncConfig::load(self.config.as_deref()).context("invalid configuration")?;
        init_tracing(env_filter(self.verbose, &config.log_level), None);

        let options = self.options(SyncOptions::from_config(&config));
        let (leads, tasks) = stores_from_config(&config);
        let containers = config.containers.clone();
        run_interruptible(move |cancel| pipeline::run(leads, tasks, containers, &options, cancel))
            .context("sync runtime failed")?
            .context("sync aborted")
    }

    fn run_fixture(&self, path: &Path) -> Result<SyncReport> {
        init_tracing(env_filter(self.verbose, "info"), None);

        let mut fixture = MemoryFixture::load(path)
            .with_context(|| format!("failed to load fixture {}", path.display()))?;
        let (leads, tasks) = fixture.stores();
        let containers = fixture.containers.clone();
        let options = self.options(SyncOptions::default());

        let (result, leads, tasks) = run_interruptible(move |cancel| {
            let result = pipeline::run(&leads, &tasks, containers, &options, cancel);
            (result, leads, tasks)
        })
        .context("sync runtime failed")?;
        let report = result.context("sync aborted")?;

        if !self.dry_run {
            fixture.capture(&leads, &tasks);
            fixture
                .save(path)
                .with_context(|| format!("failed to save fixture {}", path.display()))?;
        }
        Ok(report)
    }
}

fn exit_code(report: &SyncReport) -> ExitCode {
    if report.cancelled {
        ExitCode::from(EXIT_INTERRUPTED)
    } else if report.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "outcome")]
    outcome: &'static str,
    #[tabled(rename = "count")]
    count: usize,
}

fn print_report(report: &SyncReport) {
    let mut title = "Sync report".bold().to_string();
    if report.dry_run {
        title.push_str(&format!(" {}", "(dry run)".yellow()));
    }
    if report.cancelled {
        title.push_str(&format!(" {}", "(cancelled)".red()));
    }
    println!("{title}");

    let rows = vec![
        CountRow { outcome: "created", count: report.created },
        CountRow { outcome: "updated", count: report.updated },
        CountRow { outcome: "unchanged", count: report.unchanged },
        CountRow { outcome: "status synced", count: report.status_synced },
        CountRow { outcome: "skipped", count: report.skipped },
        CountRow { outcome: "errors", count: report.errors },
    ];
    println!("{}", Table::new(rows).with(Style::rounded()));

    for (record, reason) in report.skips() {
        println!("  ·  [{}] {}: {reason}", record.flow, record.record_id);
    }
    for error in &report.error_details {
        println!(
            "  {}  [{}] {} {}: {}",
            "✗".red(),
            error.flow,
            error.record_id,
            error.operation,
            error.message
        );
    }

    if let Some(finished) = report.finished_at {
        let elapsed = finished - report.started_at;
        println!(
            "finished {} ({} ms, {} writes)",
            finished
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S"),
            elapsed.num_milliseconds(),
            report.total_writes()
        );
    }
}
