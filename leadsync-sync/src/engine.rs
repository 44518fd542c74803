//! The reconciliation engine.
//!
//! [`ReconciliationEngine`] owns one lead store and one task store and runs
//! Flow A ([`ReconciliationEngine::sync_leads_to_tasks`]) and then Flow B
//! ([`ReconciliationEngine::sync_tasks_to_leads`]). Records are processed one
//! at a time in snapshot order; a failure in one record is recorded in the
//! report and the next record is processed.

use std::collections::{HashMap, HashSet};
use std::fmt;

use leadsync_core::description::format_description;
use leadsync_core::{
    ContainerMap, Lead, LeadRecord, LeadStore, NewTask, StatusNormalizer, Task, TaskStore,
};

use crate::cancel::CancelToken;
use crate::error::SyncError;
use crate::pipeline::SyncDirection;
use crate::report::SyncReport;
use crate::retry::RetryExecutor;

/// Why a single record could not be reconciled.
#[derive(Debug)]
pub(crate) enum RecordFailure {
    /// A remote call failed (fatal, or transient and out of retries).
    Remote {
        operation: &'static str,
        message: String,
    },
    /// The store broke its contract; the run must stop.
    Contract(String),
}

impl RecordFailure {
    pub(crate) fn remote(operation: &'static str, error: impl fmt::Display) -> Self {
        RecordFailure::Remote {
            operation,
            message: error.to_string(),
        }
    }
}

pub struct ReconciliationEngine<L, T> {
    pub(crate) leads: L,
    pub(crate) tasks: T,
    pub(crate) containers: ContainerMap,
    pub(crate) normalizer: StatusNormalizer,
    pub(crate) retry: RetryExecutor,
    pub(crate) dry_run: bool,
    pub(crate) cancel: CancelToken,
}

impl<L, T> ReconciliationEngine<L, T>
where
    L: LeadStore,
    T: TaskStore,
{
    pub fn new(leads: L, tasks: T, containers: ContainerMap) -> Self {
        Self {
            leads,
            tasks,
            containers,
            normalizer: StatusNormalizer::default(),
            retry: RetryExecutor::default(),
            dry_run: false,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: StatusNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_retry(mut self, retry: RetryExecutor) -> Self {
        self.retry = retry;
        self
    }

    /// Compute every decision but issue no writes.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Run the flows selected by `direction`, Flow A first, and return the
    /// merged report.
    ///
    /// When both flows run, a task's container wins over the lead's status
    /// and a dangling reference is counted once.
    ///
    /// Flow B is not started when the run was cancelled during Flow A.
    pub fn run(&self, direction: SyncDirection) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::new(self.dry_run);
        let mut reported_missing: HashSet<String> = HashSet::new();
        if direction.includes_leads_to_tasks() {
            let flow_a = self.leads_to_tasks(direction.includes_tasks_to_leads())?;
            reported_missing = flow_a.missing_task_records();
            report.merge(flow_a);
        }
        if direction.includes_tasks_to_leads() {
            if report.cancelled || self.cancel.is_cancelled() {
                tracing::info!("run cancelled; tasks-to-leads not started");
                report.cancelled = true;
            } else {
                report.merge(self.tasks_to_leads(&reported_missing)?);
            }
        }
        report.finish();
        tracing::info!(
            "sync finished{}: {} created, {} updated, {} unchanged, {} status synced, {} skipped, {} errors",
            if self.dry_run { " (dry run)" } else { "" },
            report.created,
            report.updated,
            report.unchanged,
            report.status_synced,
            report.skipped,
            report.errors
        );
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Read every lead row once. Duplicate ids break the join and abort.
    pub(crate) fn snapshot_leads(&self) -> Result<Vec<LeadRecord>, SyncError> {
        let records = self
            .retry
            .execute("fetch_leads", || self.leads.fetch_all(), |e| {
                self.leads.classify(e)
            })
            .map_err(|e| SyncError::Snapshot {
                store: "lead",
                message: e.to_string(),
            })?;

        let mut seen: HashMap<&str, usize> = HashMap::new();
        for record in &records {
            let id = record.id.trim();
            if id.is_empty() {
                continue;
            }
            if let Some(first) = seen.insert(id, record.row_position) {
                return Err(SyncError::Contract(format!(
                    "lead id {id} appears in rows {first} and {}",
                    record.row_position
                )));
            }
        }
        tracing::debug!("lead snapshot: {} rows", records.len());
        Ok(records)
    }

    /// Read every task once. A task without an id cannot be addressed.
    pub(crate) fn snapshot_tasks(&self) -> Result<Vec<Task>, SyncError> {
        let tasks = self
            .retry
            .execute("fetch_tasks", || self.tasks.fetch_all(), |e| {
                self.tasks.classify(e)
            })
            .map_err(|e| SyncError::Snapshot {
                store: "task",
                message: e.to_string(),
            })?;

        if let Some(bad) = tasks.iter().find(|t| t.task_id.is_empty()) {
            return Err(SyncError::Contract(format!(
                "task store returned a task with an empty id (title '{}')",
                bad.title
            )));
        }
        tracing::debug!("task snapshot: {} tasks", tasks.len());
        Ok(tasks)
    }

    /// The task a lead should have.
    pub(crate) fn desired_task(&self, lead: &Lead) -> NewTask {
        let title = if lead.name.is_empty() {
            format!("Lead {}", lead.id)
        } else {
            lead.name.clone()
        };
        NewTask {
            title,
            description: format_description(&lead.id.0, &lead.email, &lead.source),
            container: self.containers.container_for(lead.status).clone(),
        }
    }
}

/// Label used in logs and the report for a lead row.
pub(crate) fn record_label(record: &LeadRecord) -> String {
    match record.id.trim() {
        "" => format!("row {}", record.row_position),
        id => id.to_string(),
    }
}
