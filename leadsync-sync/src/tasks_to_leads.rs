//! Flow B: the container a task sits in decides its lead's status.
//!
//! Tasks are matched to leads by `external_ref` first and by the `lead_id:`
//! description marker second. The first task to claim a lead wins; later
//! claimants are skipped as ambiguous duplicates. In a full run the task's
//! container wins: Flow A leaves it in place and this flow writes it back.

use std::collections::{HashMap, HashSet};

use leadsync_core::description::parse_lead_marker;
use leadsync_core::{Lead, LeadId, LeadPatch, LeadStore, Task, TaskId, TaskStore};

use crate::engine::{RecordFailure, ReconciliationEngine};
use crate::error::SyncError;
use crate::report::{Flow, Outcome, SkipReason, SyncReport};

/// Lead lookups for one pass over the task snapshot.
struct LeadIndex<'a> {
    by_ref: HashMap<&'a TaskId, &'a Lead>,
    by_id: HashMap<&'a LeadId, &'a Lead>,
    /// Leads already claimed through a description marker in this pass.
    claimed: HashSet<&'a LeadId>,
}

impl<'a> LeadIndex<'a> {
    fn new(leads: &'a [Lead]) -> Self {
        let mut by_ref: HashMap<&'a TaskId, &'a Lead> = HashMap::new();
        let mut by_id: HashMap<&'a LeadId, &'a Lead> = HashMap::new();
        for lead in leads {
            by_id.insert(&lead.id, lead);
            if let Some(task_id) = &lead.external_ref {
                if let Some(first) = by_ref.get(task_id) {
                    tracing::warn!(
                        "leads {} and {} both reference task {task_id}; using {}",
                        first.id,
                        lead.id,
                        first.id
                    );
                    continue;
                }
                by_ref.insert(task_id, lead);
            }
        }
        Self {
            by_ref,
            by_id,
            claimed: HashSet::new(),
        }
    }

    fn resolve(&mut self, task: &Task) -> Result<&'a Lead, SkipReason> {
        if let Some(&lead) = self.by_ref.get(&task.task_id) {
            return Ok(lead);
        }
        let lead_id = parse_lead_marker(&task.description).ok_or(SkipReason::Unlinked)?;
        let lead = *self.by_id.get(&lead_id).ok_or(SkipReason::Unlinked)?;
        if lead.external_ref.is_some() || !self.claimed.insert(&lead.id) {
            return Err(SkipReason::DuplicateClaim {
                lead_id: lead_id.0,
            });
        }
        Ok(lead)
    }
}

impl<L, T> ReconciliationEngine<L, T>
where
    L: LeadStore,
    T: TaskStore,
{
    pub fn sync_tasks_to_leads(&self) -> Result<SyncReport, SyncError> {
        self.tasks_to_leads(&HashSet::new())
    }

    /// Flow B. Leads in `reported_missing` already had their dangling
    /// reference reported earlier in the run.
    pub(crate) fn tasks_to_leads(
        &self,
        reported_missing: &HashSet<String>,
    ) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::new(self.dry_run);
        let tasks = self.snapshot_tasks()?;
        let records = self.snapshot_leads()?;

        // Rows that cannot become a lead were already reported by Flow A.
        let leads: Vec<Lead> = records
            .iter()
            .filter(|r| !r.is_blank())
            .filter_map(|r| Lead::from_record(r, &self.normalizer).ok())
            .collect();
        let mut index = LeadIndex::new(&leads);
        tracing::info!(
            "tasks-to-leads: {} tasks, {} leads",
            tasks.len(),
            leads.len()
        );

        for task in &tasks {
            if self.cancel.is_cancelled() {
                tracing::info!("tasks-to-leads cancelled before task {}", task.task_id);
                report.cancelled = true;
                return Ok(report);
            }
            match self.task_to_lead(task, &mut index) {
                Ok(outcome) => report.record(Flow::TasksToLeads, task.task_id.0.clone(), outcome),
                Err(RecordFailure::Contract(message)) => return Err(SyncError::Contract(message)),
                Err(RecordFailure::Remote { operation, message }) => {
                    tracing::error!("task {}: {operation} failed: {message}", task.task_id);
                    report.record(
                        Flow::TasksToLeads,
                        task.task_id.0.clone(),
                        Outcome::Failed { operation, message },
                    );
                }
            }
        }

        let listed: HashSet<&TaskId> = tasks.iter().map(|t| &t.task_id).collect();
        for lead in &leads {
            let Some(task_id) = &lead.external_ref else {
                continue;
            };
            if !listed.contains(task_id) && !reported_missing.contains(&lead.id.0) {
                tracing::warn!(
                    "lead {}: task {task_id} not found (possibly deleted); leaving lead untouched",
                    lead.id
                );
                report.record(
                    Flow::TasksToLeads,
                    lead.id.0.clone(),
                    Outcome::skipped(SkipReason::NotFound {
                        task_id: task_id.clone(),
                    }),
                );
            }
        }
        Ok(report)
    }

    fn task_to_lead(
        &self,
        task: &Task,
        index: &mut LeadIndex<'_>,
    ) -> Result<Outcome, RecordFailure> {
        let lead = match index.resolve(task) {
            Ok(lead) => lead,
            Err(reason) => {
                match &reason {
                    SkipReason::DuplicateClaim { lead_id } => tracing::warn!(
                        "task {}: lead {lead_id} is already claimed by another task, skipping",
                        task.task_id
                    ),
                    _ => tracing::debug!("task {}: {reason}, skipping", task.task_id),
                }
                return Ok(Outcome::skipped(reason));
            }
        };

        let Some(status) = self.containers.status_for(&task.container) else {
            tracing::debug!(
                "task {}: container {} is not mapped, skipping",
                task.task_id,
                task.container
            );
            return Ok(Outcome::skipped(SkipReason::UnmappedContainer {
                container: task.container.clone(),
            }));
        };

        if status == lead.status {
            return Ok(Outcome::Unchanged);
        }
        let outcome = Outcome::StatusSynced {
            from: lead.status,
            to: status,
        };

        if self.dry_run {
            tracing::info!(
                "[dry-run] would set lead {} status {} -> {status} from task {}",
                lead.id,
                lead.status,
                task.task_id
            );
            return Ok(outcome);
        }

        let patch = LeadPatch::status(status);
        self.retry
            .execute(
                "update_lead_status",
                || self.leads.update(&lead.locator(), &patch),
                |e| self.leads.classify(e),
            )
            .map_err(|e| RecordFailure::remote("update_lead_status", e))?;
        tracing::info!(
            "lead {} (row {}): status {} -> {status} from task {}",
            lead.id,
            lead.row_position,
            lead.status,
            task.task_id
        );
        Ok(outcome)
    }
}
