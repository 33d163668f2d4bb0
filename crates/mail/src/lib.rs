//! Mail crate - Business logic for mailbox sync
//!
//! This crate provides platform-independent mail functionality including:
//! - The flat `Email` record model and sort descriptors
//! - Gmail API client, OAuth authentication and the `MessageSource` seam
//! - Paginated fetching with limits and per-message failure tolerance
//! - Storage trait with SQLite and in-memory implementations
//! - Idempotent fetch-then-save sync
//! - Sender grouping for list views
//!
//! This crate has zero UI dependencies.

pub mod config;
pub mod gmail;
pub mod models;
pub mod query;
pub mod storage;
pub mod sync;

pub use config::{GmailCredentials, SyncSettings};
pub use gmail::{
    AccessTokenProvider, GmailAuth, GmailClient, InMemorySource, MessageSource, StaticToken,
};
pub use models::{Email, MessageId, SortOrder, StoredEmail};
pub use query::{SenderGroup, Selection, group_by_sender, list_sender_groups};
pub use storage::{
    BulkDeleteReport, EmailNotFoundError, EmailStore, InMemoryEmailStore, SaveOutcome,
    SqliteEmailStore,
};
pub use sync::{
    FetchOptions, FetchProgress, MAX_PAGE_SIZE, SyncOptions, SyncStats, fetch_emails, sync_emails,
    sync_emails_with_progress,
};
