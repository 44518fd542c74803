//! # leadsync-sync
//!
//! The reconciliation engine between a lead store and a task store.
//!
//! Call [`pipeline::run`] (or build a [`ReconciliationEngine`] directly) to run
//! Flow A (lead → task) and Flow B (task → lead) once and get a
//! [`SyncReport`]. Remote calls go through [`RetryExecutor`].

pub mod cancel;
pub mod engine;
pub mod error;
mod leads_to_tasks;
pub mod pipeline;
pub mod report;
pub mod retry;
mod tasks_to_leads;

pub use cancel::CancelToken;
pub use engine::ReconciliationEngine;
pub use error::SyncError;
pub use pipeline::{SyncDirection, SyncOptions};
pub use report::{ErrorDetail, Flow, Outcome, RecordOutcome, SkipReason, SyncReport};
pub use retry::{
    RecordingSleeper, RetryEvent, RetryExecutor, RetryOutcome, RetryPolicy, Sleeper,
    ThreadSleeper,
};
