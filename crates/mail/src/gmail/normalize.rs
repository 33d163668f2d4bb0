//! Gmail API response normalization
//!
//! Converts Gmail API responses to flat [`Email`] records.

use super::api::{GmailMessage, MessagePayload};
use crate::models::{Email, MessageId};

/// Longest body preview kept, in characters
pub const PREVIEW_MAX_CHARS: usize = 300;

/// Normalize a Gmail API message to an Email record
///
/// Only `From`, `Subject` and `Date` are read. Missing headers (or a missing
/// payload) leave the corresponding fields empty.
pub fn normalize_message(gmail_msg: GmailMessage) -> Email {
    let payload = gmail_msg.payload.as_ref();
    let header = |name: &str| {
        payload
            .and_then(|p| extract_header(p, name))
            .unwrap_or_default()
    };

    Email::builder(MessageId::new(&gmail_msg.id))
        .from(header("From"))
        .subject(header("Subject"))
        .date(header("Date"))
        .body(truncate_preview(&decode_html_entities(&gmail_msg.snippet)))
        .build()
}

/// Extract a header value by name
fn extract_header(payload: &MessagePayload, name: &str) -> Option<String> {
    payload.headers.as_ref()?.iter().find_map(|h| {
        if h.name.eq_ignore_ascii_case(name) {
            Some(h.value.clone())
        } else {
            None
        }
    })
}

/// Cut a preview down to [`PREVIEW_MAX_CHARS`] on a char boundary
fn truncate_preview(s: &str) -> String {
    match s.char_indices().nth(PREVIEW_MAX_CHARS) {
        Some((end, _)) => s[..end].to_string(),
        None => s.to_string(),
    }
}

/// Decode HTML entities in snippet text
fn decode_html_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::api::Header;

    fn make_test_message(headers: Vec<(&str, &str)>, snippet: &str) -> GmailMessage {
        GmailMessage {
            id: "m1".to_string(),
            snippet: snippet.to_string(),
            payload: Some(MessagePayload {
                headers: Some(
                    headers
                        .into_iter()
                        .map(|(n, v)| Header {
                            name: n.to_string(),
                            value: v.to_string(),
                        })
                        .collect(),
                ),
            }),
        }
    }

    #[test]
    fn test_normalize_extracts_three_headers() {
        let msg = make_test_message(
            vec![
                ("Received", "from mx.example.com"),
                ("From", "Alice Smith <alice@example.com>"),
                ("To", "bob@example.com"),
                ("Subject", "Quarterly report"),
                ("Date", "Tue, 2 Jan 2024 10:00:00 +0000"),
            ],
            "See attached",
        );

        let email = normalize_message(msg);
        assert_eq!(email.id.as_str(), "m1");
        assert_eq!(email.from, "Alice Smith <alice@example.com>");
        assert_eq!(email.subject, "Quarterly report");
        assert_eq!(email.date, "Tue, 2 Jan 2024 10:00:00 +0000");
        assert_eq!(email.body, "See attached");
    }

    #[test]
    fn test_normalize_missing_headers_are_empty() {
        let msg = make_test_message(vec![("Subject", "Only a subject")], "");
        let email = normalize_message(msg);
        assert_eq!(email.from, "");
        assert_eq!(email.subject, "Only a subject");
        assert_eq!(email.date, "");
    }

    #[test]
    fn test_normalize_without_payload() {
        let msg = GmailMessage {
            id: "bare".to_string(),
            snippet: "hello".to_string(),
            payload: None,
        };
        let email = normalize_message(msg);
        assert_eq!(email.id.as_str(), "bare");
        assert_eq!(email.from, "");
        assert_eq!(email.body, "hello");
    }

    #[test]
    fn test_extract_header_case_insensitive() {
        let msg = make_test_message(vec![("FROM", "test@example.com")], "");
        let payload = msg.payload.as_ref().unwrap();
        assert_eq!(
            extract_header(payload, "From"),
            Some("test@example.com".to_string())
        );
        assert_eq!(extract_header(payload, "Cc"), None);
    }

    #[test]
    fn test_decode_html_entities() {
        let output = decode_html_entities("Hello &amp; welcome &lt;user&gt; it&#39;s me");
        assert_eq!(output, "Hello & welcome <user> it's me");
        // Escaped entities decode one level only
        assert_eq!(decode_html_entities("&amp;lt;"), "&lt;");
    }

    #[test]
    fn test_truncate_preview_on_char_boundary() {
        let long = "é".repeat(PREVIEW_MAX_CHARS + 10);
        let truncated = truncate_preview(&long);
        assert_eq!(truncated.chars().count(), PREVIEW_MAX_CHARS);
        assert_eq!(truncate_preview("short"), "short");
    }
}
