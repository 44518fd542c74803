//! Shared sync pipeline entrypoint used by CLI and daemon.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use leadsync_core::{
    ContainerMap, LeadStore, StatusNormalizer, SyncConfig, TaskStore, UnknownStatusPolicy,
};

use crate::cancel::CancelToken;
use crate::engine::ReconciliationEngine;
use crate::error::SyncError;
use crate::report::SyncReport;
use crate::retry::{RetryExecutor, RetryPolicy};

/// Which flows a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncDirection {
    /// Flow A, then Flow B.
    #[default]
    Both,
    LeadsToTasks,
    TasksToLeads,
}

impl SyncDirection {
    pub fn includes_leads_to_tasks(self) -> bool {
        matches!(self, SyncDirection::Both | SyncDirection::LeadsToTasks)
    }

    pub fn includes_tasks_to_leads(self) -> bool {
        matches!(self, SyncDirection::Both | SyncDirection::TasksToLeads)
    }
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncDirection::Both => "both",
            SyncDirection::LeadsToTasks => "leads-to-tasks",
            SyncDirection::TasksToLeads => "tasks-to-leads",
        })
    }
}

impl FromStr for SyncDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "both" => Ok(SyncDirection::Both),
            "leads-to-tasks" | "leads" | "a" => Ok(SyncDirection::LeadsToTasks),
            "tasks-to-leads" | "tasks" | "b" => Ok(SyncDirection::TasksToLeads),
            other => Err(format!(
                "unknown direction '{other}' (expected both, leads-to-tasks or tasks-to-leads)"
            )),
        }
    }
}

/// Knobs for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub direction: SyncDirection,
    pub dry_run: bool,
    pub unknown_status: UnknownStatusPolicy,
    pub retry: RetryPolicy,
}

impl SyncOptions {
    /// A full live run with the configured status policy and retry budget.
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            direction: SyncDirection::Both,
            dry_run: false,
            unknown_status: config.unknown_status,
            retry: RetryPolicy::from(config.retry),
        }
    }
}

/// Run one reconciliation pass over the given stores.
///
/// This is the canonical sync entrypoint for both `leadsync sync` and the
/// daemon processor.
pub fn run<L, T>(
    leads: L,
    tasks: T,
    containers: ContainerMap,
    options: &SyncOptions,
    cancel: CancelToken,
) -> Result<SyncReport, SyncError>
where
    L: LeadStore,
    T: TaskStore,
{
    ReconciliationEngine::new(leads, tasks, containers)
        .with_normalizer(StatusNormalizer::new(options.unknown_status))
        .with_retry(RetryExecutor::new(options.retry))
        .dry_run(options.dry_run)
        .with_cancel(cancel)
        .run(options.direction)
}

#[cfg(test)]
mod tests {
    use leadsync_core::memory::{InMemoryLeadStore, InMemoryTaskStore};
    use leadsync_core::LeadRecord;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("both", SyncDirection::Both)]
    #[case("Leads-To-Tasks", SyncDirection::LeadsToTasks)]
    #[case("tasks", SyncDirection::TasksToLeads)]
    fn direction_parses(#[case] raw: &str, #[case] expected: SyncDirection) {
        assert_eq!(raw.parse::<SyncDirection>().unwrap(), expected);
        assert_eq!(
            expected.to_string().parse::<SyncDirection>().unwrap(),
            expected
        );
    }

    #[test]
    fn unknown_direction_is_rejected() {
        assert!("sideways".parse::<SyncDirection>().is_err());
    }

    #[test]
    fn run_over_empty_stores_reports_nothing() {
        let leads = InMemoryLeadStore::default();
        let tasks = InMemoryTaskStore::default();
        let containers = ContainerMap::new("a", "b", "c", "d").unwrap();
        let report = run(
            &leads,
            &tasks,
            containers,
            &SyncOptions::default(),
            CancelToken::new(),
        )
        .expect("run");
        assert_eq!(report.total_writes(), 0);
        assert!(report.outcomes.is_empty());
        assert!(report.finished_at.is_some());
    }

    #[test]
    fn dry_run_option_reaches_the_engine() {
        let leads = InMemoryLeadStore::new(vec![LeadRecord {
            id: "L1".to_string(),
            name: "Ann".to_string(),
            ..LeadRecord::default()
        }]);
        let tasks = InMemoryTaskStore::default();
        let options = SyncOptions {
            dry_run: true,
            ..SyncOptions::default()
        };
        let containers = ContainerMap::new("a", "b", "c", "d").unwrap();
        let report = run(&leads, &tasks, containers, &options, CancelToken::new()).unwrap();
        assert!(report.dry_run);
        assert_eq!(report.created, 1);
        assert!(tasks.tasks().is_empty());
    }
}
