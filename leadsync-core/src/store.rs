//! Capability traits the reconciliation engine needs from each store.
//!
//! Concrete adapters (HTTP clients, the in-memory stores in [`crate::memory`])
//! implement these. Each store brings its own error type and tells the engine
//! which of its errors are worth retrying via [`LeadStore::classify`] /
//! [`TaskStore::classify`].

use std::error::Error as StdError;

use crate::types::{LeadLocator, LeadPatch, LeadRecord, NewTask, Task, TaskId, TaskPatch};

/// How a failed remote call should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Rate limited or server-side failure; try again after a backoff.
    Retryable,
    /// Auth, bad request or anything not known to be transient.
    Fatal,
}

/// Classifier for HTTP-shaped failures: 429 and 5xx are retryable, all other
/// statuses are fatal.
pub fn classify_http_status(status: u16) -> ErrorClass {
    match status {
        429 | 500..=599 => ErrorClass::Retryable,
        _ => ErrorClass::Fatal,
    }
}

/// Row-oriented lead store.
pub trait LeadStore {
    type Error: StdError + Send + Sync + 'static;

    /// Every lead row in store order, with row hints.
    fn fetch_all(&self) -> Result<Vec<LeadRecord>, Self::Error>;

    /// Partial update of the lead identified by `locator.id`. Fields not set in
    /// `patch` must be preserved.
    fn update(&self, locator: &LeadLocator, patch: &LeadPatch) -> Result<(), Self::Error>;

    /// Append a new lead row and return its row position.
    fn append(&self, record: &LeadRecord) -> Result<usize, Self::Error>;

    fn classify(&self, error: &Self::Error) -> ErrorClass;
}

/// Card/list-oriented task store.
pub trait TaskStore {
    type Error: StdError + Send + Sync + 'static;

    fn create(&self, task: &NewTask) -> Result<TaskId, Self::Error>;

    /// Partial update; only the fields set in `patch` change.
    fn update(&self, task_id: &TaskId, patch: &TaskPatch) -> Result<(), Self::Error>;

    fn fetch_all(&self) -> Result<Vec<Task>, Self::Error>;

    /// `Ok(None)` when the task does not exist.
    fn fetch_one(&self, task_id: &TaskId) -> Result<Option<Task>, Self::Error>;

    fn classify(&self, error: &Self::Error) -> ErrorClass;
}

impl<S: LeadStore + ?Sized> LeadStore for &S {
    type Error = S::Error;

    fn fetch_all(&self) -> Result<Vec<LeadRecord>, Self::Error> {
        (**self).fetch_all()
    }

    fn update(&self, locator: &LeadLocator, patch: &LeadPatch) -> Result<(), Self::Error> {
        (**self).update(locator, patch)
    }

    fn append(&self, record: &LeadRecord) -> Result<usize, Self::Error> {
        (**self).append(record)
    }

    fn classify(&self, error: &Self::Error) -> ErrorClass {
        (**self).classify(error)
    }
}

impl<S: TaskStore + ?Sized> TaskStore for &S {
    type Error = S::Error;

    fn create(&self, task: &NewTask) -> Result<TaskId, Self::Error> {
        (**self).create(task)
    }

    fn update(&self, task_id: &TaskId, patch: &TaskPatch) -> Result<(), Self::Error> {
        (**self).update(task_id, patch)
    }

    fn fetch_all(&self) -> Result<Vec<Task>, Self::Error> {
        (**self).fetch_all()
    }

    fn fetch_one(&self, task_id: &TaskId) -> Result<Option<Task>, Self::Error> {
        (**self).fetch_one(task_id)
    }

    fn classify(&self, error: &Self::Error) -> ErrorClass {
        (**self).classify(error)
    }
}
