//! In-memory storage implementation
//!
//! Mirrors the ordering and matching rules of the SQLite store. Used for
//! testing and dry runs.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use super::traits::{BulkDeleteReport, EmailNotFoundError, EmailStore, SaveOutcome};
use crate::models::{Email, MessageId, SortOrder, StoredEmail};

/// A stored record plus the bookkeeping the SQLite schema keeps in columns
#[derive(Debug, Clone)]
struct Row {
    email: Email,
    date_sort_key: Option<String>,
    created_at: DateTime<Utc>,
    /// Insertion sequence, stable across updates (the SQLite rowid)
    seq: u64,
}

#[derive(Default)]
struct Inner {
    rows: HashMap<String, Row>,
    next_seq: u64,
}

/// In-memory implementation of EmailStore
///
/// Uses a HashMap protected by an RwLock for thread-safe access.
#[derive(Default)]
pub struct InMemoryEmailStore {
    inner: RwLock<Inner>,
}

impl InMemoryEmailStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(&self, sort: SortOrder, filter: impl Fn(&Row) -> bool) -> Vec<Email> {
        let inner = self.inner.read().unwrap();
        let mut rows: Vec<&Row> = inner.rows.values().filter(|r| filter(r)).collect();
        rows.sort_by(|a, b| compare(sort, a, b));
        rows.into_iter().map(|r| r.email.clone()).collect()
    }
}

/// Substring match with SQLite `LIKE` semantics (ASCII case-insensitive)
fn sender_matches(from: &str, needle: &str) -> bool {
    from.to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}

/// Newest date first, undated records last, then raw header, then latest insert
fn newest_first(a: &Row, b: &Row) -> Ordering {
    a.date_sort_key
        .is_none()
        .cmp(&b.date_sort_key.is_none())
        .then_with(|| b.date_sort_key.cmp(&a.date_sort_key))
        .then_with(|| b.email.date.cmp(&a.email.date))
        .then_with(|| b.seq.cmp(&a.seq))
}

fn compare(sort: SortOrder, a: &Row, b: &Row) -> Ordering {
    match sort {
        SortOrder::DateNewest => newest_first(a, b),
        SortOrder::DateOldest => a
            .date_sort_key
            .is_none()
            .cmp(&b.date_sort_key.is_none())
            .then_with(|| a.date_sort_key.cmp(&b.date_sort_key))
            .then_with(|| a.email.date.cmp(&b.email.date))
            .then_with(|| a.seq.cmp(&b.seq)),
        SortOrder::SenderAsc => a
            .email
            .from
            .cmp(&b.email.from)
            .then_with(|| newest_first(a, b)),
        SortOrder::SenderDesc => b
            .email
            .from
            .cmp(&a.email.from)
            .then_with(|| newest_first(a, b)),
        SortOrder::Inserted => {
            (Reverse(a.created_at), Reverse(a.seq)).cmp(&(Reverse(b.created_at), Reverse(b.seq)))
        }
    }
}

impl EmailStore for InMemoryEmailStore {
    fn save_emails(&self, emails: &[Email]) -> Result<SaveOutcome> {
        let mut guard = self.inner.write().unwrap();
        let inner = &mut *guard;
        let mut outcome = SaveOutcome::default();

        for email in emails {
            let date_sort_key = email.date_sort_key();
            if let Some(row) = inner.rows.get_mut(email.id.as_str()) {
                row.email = email.clone();
                row.date_sort_key = date_sort_key;
                outcome.updated += 1;
            } else {
                let seq = inner.next_seq;
                inner.next_seq += 1;
                inner.rows.insert(
                    email.id.0.clone(),
                    Row {
                        email: email.clone(),
                        date_sort_key,
                        created_at: Utc::now(),
                        seq,
                    },
                );
                outcome.inserted += 1;
            }
        }

        Ok(outcome)
    }

    fn get_all_emails(&self, sort: SortOrder) -> Result<Vec<Email>> {
        Ok(self.sorted(sort, |_| true))
    }

    fn get_emails_by_from(&self, from: &str, sort: SortOrder) -> Result<Vec<Email>> {
        Ok(self.sorted(sort, |r| sender_matches(&r.email.from, from)))
    }

    fn get_all_senders(&self) -> Result<Vec<String>> {
        let inner = self.inner.read().unwrap();
        let senders: BTreeSet<&String> = inner.rows.values().map(|r| &r.email.from).collect();
        Ok(senders.into_iter().cloned().collect())
    }

    fn get_email(&self, id: &MessageId) -> Result<Option<StoredEmail>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.rows.get(id.as_str()).map(|r| StoredEmail {
            email: r.email.clone(),
            created_at: r.created_at,
        }))
    }

    fn count_emails(&self) -> Result<usize> {
        Ok(self.inner.read().unwrap().rows.len())
    }

    fn delete_email(&self, id: &MessageId) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        match inner.rows.remove(id.as_str()) {
            Some(_) => Ok(()),
            None => Err(EmailNotFoundError(id.clone()).into()),
        }
    }

    fn delete_emails(&self, ids: &[MessageId]) -> Result<BulkDeleteReport> {
        let mut inner = self.inner.write().unwrap();
        let mut report = BulkDeleteReport::default();

        for id in ids {
            if inner.rows.remove(id.as_str()).is_some() {
                report.deleted += 1;
            } else {
                report.not_found.push(id.clone());
            }
        }

        Ok(report)
    }

    fn delete_emails_by_sender(&self, sender: &str) -> Result<usize> {
        let mut inner = self.inner.write().unwrap();
        let before = inner.rows.len();
        inner.rows.retain(|_, r| !sender_matches(&r.email.from, sender));
        Ok(before - inner.rows.len())
    }
}
