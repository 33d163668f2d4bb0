//! Email record model shared by the fetcher, the store, and the view layer

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a message (remote message ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A flattened mailbox message
///
/// `from`, `subject` and `date` are the remote header values verbatim; any of
/// them may be empty when the header was absent. `body` is a short preview,
/// never the full message content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    /// Remote message ID (primary key)
    pub id: MessageId,
    /// Sender as reported by the `From` header
    pub from: String,
    /// Subject line
    pub subject: String,
    /// Truncated plain text preview
    pub body: String,
    /// `Date` header, unparsed
    pub date: String,
}

impl Email {
    /// Create a new email builder
    pub fn builder(id: impl Into<MessageId>) -> EmailBuilder {
        EmailBuilder::new(id.into())
    }

    /// Chronological sort key derived from the `Date` header
    ///
    /// RFC 2822 dates are normalized to a UTC RFC 3339 string, which orders
    /// correctly as text. Returns `None` when the header can't be parsed;
    /// such records sort after every dated record.
    pub fn date_sort_key(&self) -> Option<String> {
        parse_header_date(&self.date)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

/// Parse a `Date` header, tolerating trailing comments such as `(UTC)`
fn parse_header_date(raw: &str) -> Option<DateTime<Utc>> {
    let value = strip_trailing_comments(raw.trim());
    if value.is_empty() {
        return None;
    }

    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Drop trailing parenthesized comments, which may nest
fn strip_trailing_comments(mut value: &str) -> &str {
    while value.ends_with(')') {
        let mut depth = 0usize;
        let mut open = None;
        for (i, c) in value.char_indices().rev() {
            match c {
                ')' => depth += 1,
                '(' => {
                    depth -= 1;
                    if depth == 0 {
                        open = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }
        match open {
            Some(i) => value = value[..i].trim_end(),
            None => break,
        }
    }
    value
}

/// Builder for creating Email instances
pub struct EmailBuilder {
    id: MessageId,
    from: String,
    subject: String,
    body: String,
    date: String,
}

impl EmailBuilder {
    fn new(id: MessageId) -> Self {
        Self {
            id,
            from: String::new(),
            subject: String::new(),
            body: String::new(),
            date: String::new(),
        }
    }

    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn date(mut self, date: impl Into<String>) -> Self {
        self.date = date.into();
        self
    }

    pub fn build(self) -> Email {
        Email {
            id: self.id,
            from: self.from,
            subject: self.subject,
            body: self.body,
            date: self.date,
        }
    }
}

/// An email as read back from a store, with its first-insert timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEmail {
    pub email: Email,
    /// When the record was first inserted; never changed by later upserts
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_date(date: &str) -> Email {
        Email::builder("m1").date(date).build()
    }

    #[test]
    fn test_builder_defaults_to_empty_fields() {
        let email = Email::builder("abc").build();
        assert_eq!(email.id.as_str(), "abc");
        assert!(email.from.is_empty());
        assert!(email.subject.is_empty());
        assert!(email.body.is_empty());
        assert!(email.date.is_empty());
    }

    #[test]
    fn test_date_sort_key_normalizes_to_utc() {
        let email = with_date("Tue, 2 Jan 2024 10:00:00 +0200");
        assert_eq!(email.date_sort_key(), Some("2024-01-02T08:00:00Z".to_string()));
    }

    #[test]
    fn test_date_sort_key_strips_trailing_comment() {
        let email = with_date("Mon, 1 Jan 2024 09:30:00 +0000 (UTC)");
        assert_eq!(email.date_sort_key(), Some("2024-01-01T09:30:00Z".to_string()));
    }

    #[test]
    fn test_date_sort_key_strips_nested_comment() {
        let email = with_date("Mon, 1 Jan 2024 09:30:00 +0000 (A (B))");
        assert_eq!(email.date_sort_key(), Some("2024-01-01T09:30:00Z".to_string()));

        let email = with_date("Mon, 1 Jan 2024 09:30:00 +0000 (UTC) (GMT)");
        assert_eq!(email.date_sort_key(), Some("2024-01-01T09:30:00Z".to_string()));

        // Unbalanced comment is left for the parser to reject
        assert_eq!(with_date("Mon, 1 Jan 2024 09:30:00 +0000 B)").date_sort_key(), None);
    }

    #[test]
    fn test_date_sort_key_orders_chronologically() {
        // As text "Tue" sorts after "Mon", chronologically the reverse
        let earlier = with_date("Tue, 2 Jan 2024 10:00:00 +0000");
        let later = with_date("Mon, 8 Jan 2024 10:00:00 +0000");
        assert!(earlier.date.as_str() > later.date.as_str());
        assert!(earlier.date_sort_key() < later.date_sort_key());
    }

    #[test]
    fn test_date_sort_key_unparseable() {
        assert_eq!(with_date("").date_sort_key(), None);
        assert_eq!(with_date("yesterday").date_sort_key(), None);
        assert_eq!(with_date("2024-01-02").date_sort_key(), None);
    }

    #[test]
    fn test_message_id_display() {
        assert_eq!(MessageId::new("18c2f").to_string(), "18c2f");
    }
}
