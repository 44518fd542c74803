//! # leadsync-clients
//!
//! HTTP adapters implementing the store traits of `leadsync-core`:
//! [`SheetsLeadStore`] for the lead sheet and [`TrelloTaskStore`] for the
//! task board. Both are blocking (`ureq`) and classify their own failures.

pub mod error;
pub mod sheets;
pub mod trello;

pub use error::ClientError;
pub use sheets::SheetsLeadStore;
pub use trello::TrelloTaskStore;

use leadsync_core::SyncConfig;

/// Build both remote stores from a resolved config.
pub fn stores_from_config(config: &SyncConfig) -> (SheetsLeadStore, TrelloTaskStore) {
    (
        SheetsLeadStore::new(&config.sheets),
        TrelloTaskStore::new(&config.trello),
    )
}
