//! Mailbox sync: fetch from the remote, then upsert into the store

use anyhow::{Context, Result};
use log::info;

use super::fetch::{FetchOptions, FetchProgress, fetch_emails};
use crate::gmail::MessageSource;
use crate::storage::EmailStore;

/// Options for a sync run
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Maximum records to fetch; 0 fetches the whole mailbox
    pub limit: usize,
    /// Messages resolved at once during the fetch
    pub fetch_concurrency: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            limit: 0,
            fetch_concurrency: 1,
        }
    }
}

impl SyncOptions {
    pub fn limit(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    fn fetch_options(&self) -> FetchOptions {
        FetchOptions::limit(self.limit).with_concurrency(self.fetch_concurrency)
    }
}

/// Statistics from a sync operation
#[derive(Debug, Default, Clone)]
pub struct SyncStats {
    /// Number of messages fetched from the remote
    pub messages_fetched: usize,
    /// Number of messages skipped because they could not be resolved
    pub messages_skipped: usize,
    /// Number of records that were new to the store
    pub messages_inserted: usize,
    /// Number of existing records overwritten
    pub messages_updated: usize,
    /// Number of listing pages retrieved
    pub pages: usize,
    /// Duration of the sync operation
    pub duration_ms: u64,
}

/// Sync the remote mailbox into the store
///
/// Every run re-fetches and upserts, so running it repeatedly is safe. If the
/// fetch fails the store is left untouched. An empty fetch still goes through
/// the store so both paths behave the same.
pub fn sync_emails(
    source: &dyn MessageSource,
    store: &dyn EmailStore,
    options: &SyncOptions,
) -> Result<SyncStats> {
    sync_emails_with_progress(source, store, options, |_| {})
}

/// [`sync_emails`] with a callback receiving fetch progress
pub fn sync_emails_with_progress<F>(
    source: &dyn MessageSource,
    store: &dyn EmailStore,
    options: &SyncOptions,
    mut progress: F,
) -> Result<SyncStats>
where
    F: FnMut(&FetchProgress),
{
    let start = std::time::Instant::now();
    let mut last = FetchProgress::default();

    let emails = fetch_emails(source, &options.fetch_options(), |p| {
        last = *p;
        progress(p);
    })
    .context("Failed to fetch emails")?;

    let saved = store
        .save_emails(&emails)
        .context("Failed to save emails")?;

    let stats = SyncStats {
        messages_fetched: emails.len(),
        messages_skipped: last.skipped,
        messages_inserted: saved.inserted,
        messages_updated: saved.updated,
        pages: last.pages,
        duration_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        "Sync complete: {} fetched, {} new, {} updated, {} skipped in {}ms",
        stats.messages_fetched,
        stats.messages_inserted,
        stats.messages_updated,
        stats.messages_skipped,
        stats.duration_ms
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::InMemorySource;
    use crate::models::{Email, MessageId, SortOrder, StoredEmail};
    use crate::storage::{BulkDeleteReport, InMemoryEmailStore, SaveOutcome};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store wrapper that counts save calls
    #[derive(Default)]
    struct CountingStore {
        inner: InMemoryEmailStore,
        saves: AtomicUsize,
    }

    impl EmailStore for CountingStore {
        fn save_emails(&self, emails: &[Email]) -> Result<SaveOutcome> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.inner.save_emails(emails)
        }
        fn get_all_emails(&self, sort: SortOrder) -> Result<Vec<Email>> {
            self.inner.get_all_emails(sort)
        }
        fn get_emails_by_from(&self, from: &str, sort: SortOrder) -> Result<Vec<Email>> {
            self.inner.get_emails_by_from(from, sort)
        }
        fn get_all_senders(&self) -> Result<Vec<String>> {
            self.inner.get_all_senders()
        }
        fn get_email(&self, id: &MessageId) -> Result<Option<StoredEmail>> {
            self.inner.get_email(id)
        }
        fn count_emails(&self) -> Result<usize> {
            self.inner.count_emails()
        }
        fn delete_email(&self, id: &MessageId) -> Result<()> {
            self.inner.delete_email(id)
        }
        fn delete_emails(&self, ids: &[MessageId]) -> Result<BulkDeleteReport> {
            self.inner.delete_emails(ids)
        }
        fn delete_emails_by_sender(&self, sender: &str) -> Result<usize> {
            self.inner.delete_emails_by_sender(sender)
        }
    }

    fn mailbox(n: usize) -> InMemorySource {
        InMemorySource::from_emails(
            (0..n).map(|i| Email::builder(format!("m{}", i)).from("a@example.com").build()),
        )
    }

    #[test]
    fn test_fetch_failure_never_touches_store() {
        let source = mailbox(3).with_listing_failure_after(0);
        let store = CountingStore::default();

        let err = sync_emails(&source, &store, &SyncOptions::default()).unwrap_err();
        assert!(format!("{:#}", err).starts_with("Failed to fetch emails"));
        assert_eq!(store.saves.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_fetch_still_saves() {
        let source = mailbox(0);
        let store = CountingStore::default();

        let stats = sync_emails(&source, &store, &SyncOptions::default()).unwrap();
        assert_eq!(stats.messages_fetched, 0);
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stats_split_inserts_and_updates() {
        let source = mailbox(4).with_failing_message("m3");
        let store = CountingStore::default();

        let first = sync_emails(&source, &store, &SyncOptions::limit(2)).unwrap();
        assert_eq!(first.messages_inserted, 2);
        assert_eq!(first.messages_updated, 0);

        let second = sync_emails(&source, &store, &SyncOptions::default()).unwrap();
        assert_eq!(second.messages_fetched, 3);
        assert_eq!(second.messages_inserted, 1);
        assert_eq!(second.messages_updated, 2);
        assert_eq!(second.messages_skipped, 1);
        assert_eq!(store.count_emails().unwrap(), 3);
    }
}
