//! leadsync core library: domain types, status normalization, store traits,
//! configuration.
//!
//! - [`types`]: lead/task records, ids, partial updates
//! - [`status`]: [`CanonicalStatus`] and [`StatusNormalizer`]
//! - [`container`]: the status ↔ container bijection
//! - [`description`]: task description layout and the `lead_id:` marker
//! - [`store`]: [`LeadStore`] / [`TaskStore`] capability traits
//! - [`memory`]: in-memory stores and YAML fixtures
//! - [`config`]: [`SyncConfig`] loading
//! - [`error`]: [`CoreError`], [`ConfigError`]

pub mod config;
pub mod container;
pub mod description;
pub mod error;
pub mod memory;
pub mod status;
pub mod store;
pub mod types;

pub use config::SyncConfig;
pub use container::ContainerMap;
pub use error::{ConfigError, CoreError};
pub use status::{CanonicalStatus, StatusNormalizer, UnknownStatusPolicy};
pub use store::{classify_http_status, ErrorClass, LeadStore, TaskStore};
pub use types::{
    ContainerId, Lead, LeadId, LeadLocator, LeadPatch, LeadRecord, NewTask, Task, TaskId,
    TaskPatch,
};
