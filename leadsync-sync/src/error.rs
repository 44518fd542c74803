//! Error types for leadsync-sync.

use thiserror::Error;

/// Errors that abort a whole reconciliation run.
///
/// Per-record failures never surface here; they are recorded in the
/// [`crate::SyncReport`] and the run carries on.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A full snapshot read failed after retries, so no decision can be made.
    #[error("failed to read {store} snapshot: {message}")]
    Snapshot {
        store: &'static str,
        message: String,
    },

    /// A store returned data that breaks its contract (empty task id,
    /// duplicate lead ids, ...).
    #[error("store contract violation: {0}")]
    Contract(String),
}
