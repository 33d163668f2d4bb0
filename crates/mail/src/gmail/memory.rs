//! In-memory message source
//!
//! Serves a fixed mailbox through the same paginated contract as the Gmail
//! API. Used by tests and for offline dry runs.

use anyhow::{Context, Result, bail};
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::MessageSource;
use super::api::{GmailMessage, Header, ListMessagesResponse, MessagePayload, MessageRef};
use crate::models::{Email, MessageId};

/// In-memory implementation of MessageSource
///
/// Page tokens are stringified offsets into the mailbox.
pub struct InMemorySource {
    messages: Vec<GmailMessage>,
    page_cap: usize,
    failing_ids: HashSet<String>,
    /// Listing fails once this many pages have been served
    fail_listing_after: Option<usize>,
    list_requests: Mutex<Vec<usize>>,
    get_calls: AtomicUsize,
}

impl InMemorySource {
    /// Create a source serving the given messages in order
    pub fn new(messages: Vec<GmailMessage>) -> Self {
        Self {
            messages,
            page_cap: 500,
            failing_ids: HashSet::new(),
            fail_listing_after: None,
            list_requests: Mutex::new(Vec::new()),
            get_calls: AtomicUsize::new(0),
        }
    }

    /// Create a source whose messages carry the given records' fields
    pub fn from_emails(emails: impl IntoIterator<Item = Email>) -> Self {
        Self::new(emails.into_iter().map(to_gmail_message).collect())
    }

    /// Serve at most `cap` IDs per page, whatever the caller requests
    pub fn with_page_cap(mut self, cap: usize) -> Self {
        self.page_cap = cap.max(1);
        self
    }

    /// Make resolving this message ID fail
    pub fn with_failing_message(mut self, id: impl Into<String>) -> Self {
        self.failing_ids.insert(id.into());
        self
    }

    /// Make every listing call fail after `pages` successful pages
    pub fn with_listing_failure_after(mut self, pages: usize) -> Self {
        self.fail_listing_after = Some(pages);
        self
    }

    /// Page sizes requested so far, one entry per listing call
    pub fn list_requests(&self) -> Vec<usize> {
        self.list_requests.lock().unwrap().clone()
    }

    /// Number of message resolution calls made so far
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Total number of listable messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl MessageSource for InMemorySource {
    fn list_messages(
        &self,
        max_results: usize,
        page_token: Option<&str>,
    ) -> Result<ListMessagesResponse> {
        let mut requests = self.list_requests.lock().unwrap();
        if let Some(limit) = self.fail_listing_after
            && requests.len() >= limit
        {
            requests.push(max_results);
            bail!("Listing unavailable after {} pages", limit);
        }
        requests.push(max_results);

        let offset = match page_token {
            Some(token) => token
                .parse::<usize>()
                .with_context(|| format!("Invalid page token: {}", token))?,
            None => 0,
        };

        let size = max_results.clamp(1, self.page_cap);
        let start = offset.min(self.messages.len());
        let end = (start + size).min(self.messages.len());

        let refs: Vec<MessageRef> = self.messages[start..end]
            .iter()
            .map(|m| MessageRef { id: m.id.clone() })
            .collect();

        Ok(ListMessagesResponse {
            messages: if refs.is_empty() { None } else { Some(refs) },
            next_page_token: (end < self.messages.len()).then(|| end.to_string()),
            result_size_estimate: Some(self.messages.len() as u32),
        })
    }

    fn get_message(&self, id: &MessageId) -> Result<GmailMessage> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);

        if self.failing_ids.contains(id.as_str()) {
            bail!("Message {} is not accessible", id);
        }

        self.messages
            .iter()
            .find(|m| m.id == id.as_str())
            .cloned()
            .with_context(|| format!("Message {} not found", id))
    }
}

/// Render a record as the API would return it; empty fields become absent headers
fn to_gmail_message(email: Email) -> GmailMessage {
    let headers = [
        ("From", email.from),
        ("Subject", email.subject),
        ("Date", email.date),
    ]
    .into_iter()
    .filter(|(_, value)| !value.is_empty())
    .map(|(name, value)| Header {
        name: name.to_string(),
        value,
    })
    .collect();

    GmailMessage {
        id: email.id.0,
        snippet: email.body,
        payload: Some(MessagePayload {
            headers: Some(headers),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(n: usize) -> InMemorySource {
        InMemorySource::from_emails((0..n).map(|i| {
            Email::builder(format!("m{}", i))
                .from(format!("sender{}@example.com", i))
                .build()
        }))
    }

    #[test]
    fn test_pages_follow_offsets() {
        let src = source(5).with_page_cap(2);

        let first = src.list_messages(10, None).unwrap();
        assert_eq!(first.messages.as_ref().unwrap().len(), 2);
        assert_eq!(first.next_page_token.as_deref(), Some("2"));

        let last = src.list_messages(10, Some("4")).unwrap();
        assert_eq!(last.messages.unwrap()[0].id, "m4");
        assert!(last.next_page_token.is_none());
        assert_eq!(src.list_requests(), vec![10, 10]);
    }

    #[test]
    fn test_failing_message() {
        let src = source(2).with_failing_message("m1");
        assert!(src.get_message(&MessageId::new("m0")).is_ok());
        assert!(src.get_message(&MessageId::new("m1")).is_err());
        assert_eq!(src.get_calls(), 2);
    }

    #[test]
    fn test_listing_failure_after_pages() {
        let src = source(4).with_page_cap(1).with_listing_failure_after(1);
        assert!(src.list_messages(1, None).is_ok());
        assert!(src.list_messages(1, Some("1")).is_err());
    }

    #[test]
    fn test_empty_fields_become_absent_headers() {
        let msg = to_gmail_message(Email::builder("x").subject("Hi").build());
        let headers = msg.payload.unwrap().headers.unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].name, "Subject");
    }
}
