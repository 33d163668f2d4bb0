//! Storage traits and implementations
//!
//! This module defines the storage abstraction layer for email records.
//! The trait-based design allows swapping between in-memory and SQLite
//! storage implementations.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryEmailStore;
pub use sqlite::SqliteEmailStore;
pub use traits::{BulkDeleteReport, EmailNotFoundError, EmailStore, SaveOutcome};
