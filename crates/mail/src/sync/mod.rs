//! Sync engine for fetching and storing mail
//!
//! Provides idempotent sync operations that can be safely retried.

mod fetch;
mod mailbox;

pub use fetch::{FetchOptions, FetchProgress, MAX_CONCURRENCY, MAX_PAGE_SIZE, fetch_emails};
pub use mailbox::{SyncOptions, SyncStats, sync_emails, sync_emails_with_progress};
