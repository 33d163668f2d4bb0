//! Storage trait definitions

use crate::models::{Email, MessageId, SortOrder, StoredEmail};
use anyhow::Result;

/// Error returned when a targeted delete matches no record
///
/// Callers distinguish it with `err.downcast_ref::<EmailNotFoundError>()`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Email not found: {0}")]
pub struct EmailNotFoundError(pub MessageId);

/// Counts from a batch upsert
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Records that did not exist before
    pub inserted: usize,
    /// Existing records whose mutable fields were overwritten
    pub updated: usize,
}

impl SaveOutcome {
    pub fn total(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Result of a best-effort bulk delete
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BulkDeleteReport {
    /// Records removed
    pub deleted: usize,
    /// Requested IDs with no matching record
    pub not_found: Vec<MessageId>,
    /// Requested IDs whose delete failed, with the error message
    pub failed: Vec<(MessageId, String)>,
}

/// Trait for email storage operations
///
/// Implementations are shared between callers; nothing here assumes
/// exclusive access to the underlying store.
pub trait EmailStore: Send + Sync {
    /// Insert or merge each record keyed on its ID
    ///
    /// Existing records keep their ID and `created_at`; `from`, `subject`,
    /// `body` and `date` are overwritten. The batch is applied atomically:
    /// if any record fails, nothing from the batch is kept and the error
    /// names the failing ID.
    fn save_emails(&self, emails: &[Email]) -> Result<SaveOutcome>;

    /// Every stored record in the given order
    fn get_all_emails(&self, sort: SortOrder) -> Result<Vec<Email>>;

    /// Records whose sender contains `from` as a substring
    ///
    /// Matching follows the store's default collation (ASCII
    /// case-insensitive for both bundled stores).
    fn get_emails_by_from(&self, from: &str, sort: SortOrder) -> Result<Vec<Email>>;

    /// Distinct sender values, sorted lexicographically
    fn get_all_senders(&self) -> Result<Vec<String>>;

    /// Look up a single record with its insert timestamp
    fn get_email(&self, id: &MessageId) -> Result<Option<StoredEmail>>;

    /// Count stored records
    fn count_emails(&self) -> Result<usize>;

    /// Delete exactly one record
    ///
    /// Returns [`EmailNotFoundError`] if no record has this ID.
    fn delete_email(&self, id: &MessageId) -> Result<()>;

    /// Delete each listed record; missing IDs don't stop the rest
    fn delete_emails(&self, ids: &[MessageId]) -> Result<BulkDeleteReport>;

    /// Delete every record whose sender contains `sender`; returns the count
    fn delete_emails_by_sender(&self, sender: &str) -> Result<usize>;
}
