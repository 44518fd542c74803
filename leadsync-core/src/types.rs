//! Domain types shared by the stores and the reconciliation engine.
//!
//! Store adapters produce [`LeadRecord`]s (raw rows) and [`Task`]s. The engine
//! turns each record into a [`Lead`] right away, so a free-form status string
//! never travels past [`crate::status::StatusNormalizer`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::status::{CanonicalStatus, StatusNormalizer};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Stable, externally assigned identifier of a lead. The only join key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadId(pub String);

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for LeadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for LeadId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Store-assigned identifier of a task (card).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Identifier of a list/column in the task store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(pub String);

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ContainerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ContainerId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Lead side
// ---------------------------------------------------------------------------

/// A lead row exactly as the lead store returned it.
///
/// `row_position` is a positional hint for the adapter; it may change between
/// reads and is never used as identity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LeadRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub external_ref: String,
    #[serde(default, skip_serializing)]
    pub row_position: usize,
}

impl LeadRecord {
    /// A row with no id, name or email carries nothing to reconcile.
    pub fn is_blank(&self) -> bool {
        self.id.trim().is_empty() && self.name.trim().is_empty() && self.email.trim().is_empty()
    }
}

/// A lead after boundary normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lead {
    pub id: LeadId,
    pub name: String,
    pub email: String,
    pub source: String,
    pub status: CanonicalStatus,
    pub external_ref: Option<TaskId>,
    pub row_position: usize,
}

impl Lead {
    /// Normalize a raw record.
    ///
    /// Fails with [`CoreError::MissingLeadId`] when the id cell is empty and
    /// with [`CoreError::UnrecognizedStatus`] when the normalizer's policy
    /// rejects the status. Callers are expected to filter blank rows first.
    pub fn from_record(
        record: &LeadRecord,
        normalizer: &StatusNormalizer,
    ) -> Result<Self, CoreError> {
        let id = record.id.trim();
        if id.is_empty() {
            return Err(CoreError::MissingLeadId {
                row: record.row_position,
            });
        }
        let status = normalizer.try_normalize(&record.status)?;
        let external_ref = match record.external_ref.trim() {
            "" => None,
            r => Some(TaskId::from(r)),
        };
        Ok(Self {
            id: LeadId::from(id),
            name: record.name.trim().to_string(),
            email: record.email.trim().to_string(),
            source: record.source.trim().to_string(),
            status,
            external_ref,
            row_position: record.row_position,
        })
    }

    /// How the engine addresses this lead when writing back.
    pub fn locator(&self) -> LeadLocator {
        LeadLocator {
            id: self.id.clone(),
            row_hint: self.row_position,
        }
    }
}

/// Address of a lead for a write: the stable id plus a row hint the adapter
/// may use only after checking the row still holds that id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadLocator {
    pub id: LeadId,
    pub row_hint: usize,
}

/// Partial lead update. `None` fields are left untouched by the store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LeadPatch {
    pub status: Option<CanonicalStatus>,
    pub external_ref: Option<TaskId>,
}

impl LeadPatch {
    pub fn status(status: CanonicalStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn external_ref(task_id: TaskId) -> Self {
        Self {
            external_ref: Some(task_id),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.external_ref.is_none()
    }

    /// Merge this patch into a raw record in place.
    pub fn apply_to(&self, record: &mut LeadRecord) {
        if let Some(status) = self.status {
            record.status = status.to_string();
        }
        if let Some(task_id) = &self.external_ref {
            record.external_ref = task_id.0.clone();
        }
    }
}

// ---------------------------------------------------------------------------
// Task side
// ---------------------------------------------------------------------------

/// A task (card) as held by the task store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub container: ContainerId,
}

/// Fields for a task about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub container: ContainerId,
}

impl NewTask {
    pub fn into_task(self, task_id: TaskId) -> Task {
        Task {
            task_id,
            title: self.title,
            description: self.description,
            container: self.container,
        }
    }
}

/// Partial task update. `None` fields are left untouched by the store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub container: Option<ContainerId>,
}

impl TaskPatch {
    /// The patch that turns `current` into `desired`, carrying only the
    /// fields that differ.
    pub fn diff(current: &Task, desired: &NewTask) -> Self {
        Self {
            title: (current.title != desired.title).then(|| desired.title.clone()),
            description: (current.description != desired.description)
                .then(|| desired.description.clone()),
            container: (current.container != desired.container)
                .then(|| desired.container.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.container.is_none()
    }

    /// Names of the fields this patch sets, for logging.
    pub fn fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        if self.container.is_some() {
            fields.push("container");
        }
        fields
    }

    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(container) = &self.container {
            task.container = container.clone();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
