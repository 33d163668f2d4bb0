//! Sender grouping for list views
//!
//! The store returns flat, ordered records; views group them here. Grouping
//! is a pure function of the records, and selection is tracked separately
//! as a set of IDs.

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::models::{Email, MessageId, SortOrder};
use crate::storage::EmailStore;

/// A run of consecutive records from the same sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SenderGroup {
    pub sender: String,
    pub emails: Vec<Email>,
}

impl SenderGroup {
    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &MessageId> {
        self.emails.iter().map(|e| &e.id)
    }

    /// Header text such as `alice@example.com (3 emails)`
    pub fn title(&self) -> String {
        let sender = if self.sender.is_empty() {
            "(unknown sender)"
        } else {
            &self.sender
        };
        format!("{} ({} emails)", sender, self.emails.len())
    }
}

/// Group contiguous records that share a sender, keeping the input order
///
/// A sender that appears in two separate runs yields two groups; sort by
/// sender first for exactly one group per sender.
pub fn group_by_sender(emails: Vec<Email>) -> Vec<SenderGroup> {
    let mut groups: Vec<SenderGroup> = Vec::new();

    for email in emails {
        match groups.last_mut() {
            Some(group) if group.sender == email.from => group.emails.push(email),
            _ => groups.push(SenderGroup {
                sender: email.from.clone(),
                emails: vec![email],
            }),
        }
    }

    groups
}

/// Load records from the store and group them by sender
///
/// # Arguments
/// * `store` - The storage backend
/// * `sender` - Optional sender substring filter
/// * `sort` - Record order before grouping
pub fn list_sender_groups(
    store: &dyn EmailStore,
    sender: Option<&str>,
    sort: SortOrder,
) -> Result<Vec<SenderGroup>> {
    let emails = match sender {
        Some(sender) => store.get_emails_by_from(sender, sort)?,
        None => store.get_all_emails(sort)?,
    };
    Ok(group_by_sender(emails))
}

/// A set of selected record IDs, held by the view rather than the store
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<MessageId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select or deselect a single record
    pub fn set(&mut self, id: MessageId, selected: bool) {
        if selected {
            self.ids.insert(id);
        } else {
            self.ids.remove(&id);
        }
    }

    /// Flip a record's selection; returns whether it is now selected
    pub fn toggle(&mut self, id: MessageId) -> bool {
        if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        }
    }

    /// Select or deselect every record in a group
    pub fn set_group(&mut self, group: &SenderGroup, selected: bool) {
        for id in group.ids() {
            self.set(id.clone(), selected);
        }
    }

    /// Whether every record of the group is selected
    pub fn is_group_selected(&self, group: &SenderGroup) -> bool {
        !group.is_empty() && group.ids().all(|id| self.ids.contains(id))
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.ids.contains(id)
    }

    /// Drop selected IDs that are no longer among `emails`
    pub fn retain_present(&mut self, emails: &[Email]) {
        let present: BTreeSet<&MessageId> = emails.iter().map(|e| &e.id).collect();
        self.ids.retain(|id| present.contains(id));
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Selected IDs in sorted order
    pub fn ids(&self) -> Vec<MessageId> {
        self.ids.iter().cloned().collect()
    }
}

impl FromIterator<MessageId> for Selection {
    fn from_iter<I: IntoIterator<Item = MessageId>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}
