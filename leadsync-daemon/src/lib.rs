//! Scheduler daemon: periodic sync processor + control socket.

mod error;
pub mod log_rotation;
pub mod logging;
pub mod paths;
pub mod protocol;
mod runtime;

pub use error::DaemonError;
pub use logging::init_tracing;
pub use protocol::{
    request_status, request_stop, request_sync, send_request, DaemonRequest, DaemonResponse,
};
pub use runtime::{
    run, run_interruptible, start_blocking, DaemonState, RemoteSync, RunSummary, SyncRunner,
};
