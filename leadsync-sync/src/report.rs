//! Per-run report: counters, per-record outcomes and error details.
//!
//! Each flow builds its own [`SyncReport`]; the engine merges them. Nothing
//! here is global.

use std::collections::HashSet;
use std::fmt;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;

use leadsync_core::{CanonicalStatus, ContainerId, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Flow {
    LeadsToTasks,
    TasksToLeads,
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Flow::LeadsToTasks => "leads-to-tasks",
            Flow::TasksToLeads => "tasks-to-leads",
        })
    }
}

/// Why a record was deliberately left alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    BlankRow,
    MissingId,
    UnrecognizedStatus { raw: String },
    /// The referenced counterpart no longer exists. The reference is kept.
    NotFound { task_id: TaskId },
    Unlinked,
    UnmappedContainer { container: ContainerId },
    /// Another task already holds this lead.
    DuplicateClaim { lead_id: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::BlankRow => f.write_str("blank row"),
            SkipReason::MissingId => f.write_str("missing id"),
            SkipReason::UnrecognizedStatus { raw } => write!(f, "unrecognized status '{raw}'"),
            SkipReason::NotFound { task_id } => {
                write!(f, "task {task_id} not found (possibly deleted)")
            }
            SkipReason::Unlinked => f.write_str("unlinked"),
            SkipReason::UnmappedContainer { container } => {
                write!(f, "unmapped container {container}")
            }
            SkipReason::DuplicateClaim { lead_id } => {
                write!(f, "ambiguous duplicate claim on lead {lead_id}")
            }
        }
    }
}

/// What happened to one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// A task was created. `task_id` is `None` on a dry run.
    Created { task_id: Option<TaskId> },
    Updated { fields: Vec<&'static str> },
    Unchanged,
    StatusSynced {
        from: CanonicalStatus,
        to: CanonicalStatus,
    },
    Skipped { reason: SkipReason },
    Failed {
        operation: &'static str,
        message: String,
    },
}

impl Outcome {
    pub fn skipped(reason: SkipReason) -> Self {
        Outcome::Skipped { reason }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordOutcome {
    pub flow: Flow,
    pub record_id: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub flow: Flow,
    pub record_id: String,
    pub operation: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub cancelled: bool,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub status_synced: usize,
    pub skipped: usize,
    pub errors: usize,
    pub outcomes: Vec<RecordOutcome>,
    pub error_details: Vec<ErrorDetail>,
}

impl SyncReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            cancelled: false,
            created: 0,
            updated: 0,
            unchanged: 0,
            status_synced: 0,
            skipped: 0,
            errors: 0,
            outcomes: Vec::new(),
            error_details: Vec::new(),
        }
    }

    /// Count `outcome` and keep it. Failures also land in `error_details`.
    pub fn record(&mut self, flow: Flow, record_id: impl Into<String>, outcome: Outcome) {
        let record_id = record_id.into();
        match &outcome {
            Outcome::Created { .. } => self.created += 1,
            Outcome::Updated { .. } => self.updated += 1,
            Outcome::Unchanged => self.unchanged += 1,
            Outcome::StatusSynced { .. } => self.status_synced += 1,
            Outcome::Skipped { .. } => self.skipped += 1,
            Outcome::Failed { operation, message } => {
                self.errors += 1;
                self.error_details.push(ErrorDetail {
                    flow,
                    record_id: record_id.clone(),
                    operation: *operation,
                    message: message.clone(),
                });
            }
        }
        self.outcomes.push(RecordOutcome {
            flow,
            record_id,
            outcome,
        });
    }

    /// Fold another report (usually the next flow's) into this one.
    pub fn merge(&mut self, other: SyncReport) {
        self.started_at = self.started_at.min(other.started_at);
        self.finished_at = match (self.finished_at, other.finished_at) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.dry_run |= other.dry_run;
        self.cancelled |= other.cancelled;
        self.created += other.created;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.status_synced += other.status_synced;
        self.skipped += other.skipped;
        self.errors += other.errors;
        self.outcomes.extend(other.outcomes);
        self.error_details.extend(other.error_details);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Writes issued (or, on a dry run, that would have been issued).
    pub fn total_writes(&self) -> usize {
        self.created + self.updated + self.status_synced
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    /// Lead ids this run reported as pointing at a missing task.
    pub fn missing_task_records(&self) -> HashSet<String> {
        self.skips()
            .filter(|(o, reason)| {
                o.flow == Flow::LeadsToTasks && matches!(reason, SkipReason::NotFound { .. })
            })
            .map(|(o, _)| o.record_id.clone())
            .collect()
    }

    pub fn skips(&self) -> impl Iterator<Item = (&RecordOutcome, &SkipReason)> {
        self.outcomes.iter().filter_map(|o| match &o.outcome {
            Outcome::Skipped { reason } => Some((o, reason)),
            _ => None,
        })
    }

    /// Human-readable summary. Timestamps are left out so equal runs render
    /// equal text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut title = String::from("Sync report");
        if self.dry_run {
            title.push_str(" (dry run)");
        }
        if self.cancelled {
            title.push_str(" (cancelled)");
        }
        let _ = writeln!(out, "{title}");
        for (label, value) in [
            ("created", self.created),
            ("updated", self.updated),
            ("unchanged", self.unchanged),
            ("status synced", self.status_synced),
            ("skipped", self.skipped),
            ("errors", self.errors),
            ("total writes", self.total_writes()),
        ] {
            let _ = writeln!(out, "  {:<14} {value}", format!("{label}:"));
        }

        let skips: Vec<_> = self.skips().collect();
        if !skips.is_empty() {
            let _ = writeln!(out, "Skipped:");
            for (o, reason) in skips {
                let _ = writeln!(out, "  [{}] {}: {reason}", o.flow, o.record_id);
            }
        }
        if !self.error_details.is_empty() {
            let _ = writeln!(out, "Errors:");
            for e in &self.error_details {
                let _ = writeln!(
                    out,
                    "  [{}] {} {}: {}",
                    e.flow, e.record_id, e.operation, e.message
                );
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
