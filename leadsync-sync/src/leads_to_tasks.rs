//! Flow A: every lead gets exactly one task, created once and then kept in
//! line with the lead's name, details and status.
//!
//! `Lead.external_ref` is the idempotency anchor. An empty ref means
//! "create and write the new id back"; a set ref means "diff and patch".
//! A ref pointing at a task that no longer exists is reported and kept.
//!
//! When Flow B follows in the same run, a linked task sitting in a mapped
//! container is not moved: its container is the lead's status source.

use std::collections::HashMap;

use leadsync_core::{
    CoreError, Lead, LeadPatch, LeadRecord, LeadStore, NewTask, Task, TaskId, TaskPatch,
    TaskStore,
};

use crate::engine::{record_label, RecordFailure, ReconciliationEngine};
use crate::error::SyncError;
use crate::report::{Flow, Outcome, SkipReason, SyncReport};

impl<L, T> ReconciliationEngine<L, T>
where
    L: LeadStore,
    T: TaskStore,
{
    pub fn sync_leads_to_tasks(&self) -> Result<SyncReport, SyncError> {
        self.leads_to_tasks(false)
    }

    /// Flow A. With `task_status_wins`, a linked task in a mapped container
    /// keeps that container.
    pub(crate) fn leads_to_tasks(&self, task_status_wins: bool) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::new(self.dry_run);
        let records = self.snapshot_leads()?;
        let tasks = self.snapshot_tasks()?;
        let index: HashMap<&TaskId, &Task> = tasks.iter().map(|t| (&t.task_id, t)).collect();
        tracing::info!(
            "leads-to-tasks: {} lead rows, {} tasks",
            records.len(),
            tasks.len()
        );

        for record in &records {
            if self.cancel.is_cancelled() {
                tracing::info!("leads-to-tasks cancelled before {}", record_label(record));
                report.cancelled = true;
                break;
            }
            let label = record_label(record);
            match self.lead_to_task(record, &index, task_status_wins) {
                Ok(outcome) => report.record(Flow::LeadsToTasks, label, outcome),
                Err(RecordFailure::Contract(message)) => return Err(SyncError::Contract(message)),
                Err(RecordFailure::Remote { operation, message }) => {
                    tracing::error!(
                        "lead {label} (row {}): {operation} failed: {message}",
                        record.row_position
                    );
                    report.record(
                        Flow::LeadsToTasks,
                        label,
                        Outcome::Failed { operation, message },
                    );
                }
            }
        }
        Ok(report)
    }

    fn lead_to_task(
        &self,
        record: &LeadRecord,
        index: &HashMap<&TaskId, &Task>,
        task_status_wins: bool,
    ) -> Result<Outcome, RecordFailure> {
        if record.is_blank() {
            tracing::debug!("row {}: blank, skipping", record.row_position);
            return Ok(Outcome::skipped(SkipReason::BlankRow));
        }

        let lead = match Lead::from_record(record, &self.normalizer) {
            Ok(lead) => lead,
            Err(CoreError::MissingLeadId { row }) => {
                tracing::warn!("row {row}: lead has no id, skipping");
                return Ok(Outcome::skipped(SkipReason::MissingId));
            }
            Err(CoreError::UnrecognizedStatus(raw)) => {
                tracing::warn!("lead {}: unrecognized status '{raw}', skipping", record.id.trim());
                return Ok(Outcome::skipped(SkipReason::UnrecognizedStatus { raw }));
            }
            Err(other) => return Err(RecordFailure::remote("normalize_lead", other)),
        };

        let desired = self.desired_task(&lead);
        match &lead.external_ref {
            None => self.create_task(&lead, &desired),
            Some(task_id) => {
                self.refresh_task(&lead, task_id, &desired, index, task_status_wins)
            }
        }
    }

    fn create_task(&self, lead: &Lead, desired: &NewTask) -> Result<Outcome, RecordFailure> {
        if self.dry_run {
            tracing::info!("[dry-run] would create task for lead {}", lead.id);
            return Ok(Outcome::Created { task_id: None });
        }

        let task_id = self
            .retry
            .execute("create_task", || self.tasks.create(desired), |e| {
                self.tasks.classify(e)
            })
            .map_err(|e| RecordFailure::remote("create_task", e))?;
        if task_id.is_empty() {
            return Err(RecordFailure::Contract(format!(
                "task store returned an empty id for the task of lead {}",
                lead.id
            )));
        }

        let patch = LeadPatch::external_ref(task_id.clone());
        self.retry
            .execute(
                "write_external_ref",
                || self.leads.update(&lead.locator(), &patch),
                |e| self.leads.classify(e),
            )
            .map_err(|e| RecordFailure::Remote {
                operation: "write_external_ref",
                message: format!("task {task_id} was created but not linked: {e}"),
            })?;

        tracing::info!(
            "lead {} (row {}): created task {task_id}",
            lead.id,
            lead.row_position
        );
        Ok(Outcome::Created {
            task_id: Some(task_id),
        })
    }

    fn refresh_task(
        &self,
        lead: &Lead,
        task_id: &TaskId,
        desired: &NewTask,
        index: &HashMap<&TaskId, &Task>,
        task_status_wins: bool,
    ) -> Result<Outcome, RecordFailure> {
        let current = match index.get(task_id) {
            Some(task) => (*task).clone(),
            // Missing from the board listing (archived, or gone); ask directly.
            None => {
                let found = self
                    .retry
                    .execute("fetch_task", || self.tasks.fetch_one(task_id), |e| {
                        self.tasks.classify(e)
                    })
                    .map_err(|e| RecordFailure::remote("fetch_task", e))?;
                match found {
                    Some(task) => task,
                    None => {
                        tracing::warn!(
                            "lead {}: task {task_id} not found (possibly deleted); keeping reference",
                            lead.id
                        );
                        return Ok(Outcome::skipped(SkipReason::NotFound {
                            task_id: task_id.clone(),
                        }));
                    }
                }
            }
        };

        let mut patch = TaskPatch::diff(&current, desired);
        if task_status_wins
            && patch.container.is_some()
            && self.containers.status_for(&current.container).is_some()
        {
            tracing::debug!(
                "lead {}: task {task_id} stays in {}; tasks-to-leads applies its status",
                lead.id,
                current.container
            );
            patch.container = None;
        }
        if patch.is_empty() {
            tracing::debug!("lead {}: task {task_id} up to date", lead.id);
            return Ok(Outcome::Unchanged);
        }
        let fields = patch.fields();

        if self.dry_run {
            tracing::info!(
                "[dry-run] would update task {task_id} for lead {}: {}",
                lead.id,
                fields.join(", ")
            );
            return Ok(Outcome::Updated { fields });
        }

        self.retry
            .execute("update_task", || self.tasks.update(task_id, &patch), |e| {
                self.tasks.classify(e)
            })
            .map_err(|e| RecordFailure::remote("update_task", e))?;
        tracing::info!(
            "lead {}: updated task {task_id} ({})",
            lead.id,
            fields.join(", ")
        );
        Ok(Outcome::Updated { fields })
    }
}
