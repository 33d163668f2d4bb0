//! Gmail API integration
//!
//! This module provides:
//! - The [`MessageSource`] seam the fetcher paginates over
//! - OAuth2 token acquisition for the Gmail REST API
//! - A Gmail API client implementing [`MessageSource`]
//! - Response normalization to [`crate::models::Email`]

mod auth;
mod client;
mod memory;
mod normalize;
mod source;

pub use auth::{AccessTokenProvider, GmailAuth, StaticToken};
pub use client::GmailClient;
pub use memory::InMemorySource;
pub use normalize::{PREVIEW_MAX_CHARS, normalize_message};
pub use source::MessageSource;

/// Gmail API response types
pub mod api {
    use serde::{Deserialize, Serialize};

    /// Response from listing messages
    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListMessagesResponse {
        pub messages: Option<Vec<MessageRef>>,
        pub next_page_token: Option<String>,
        pub result_size_estimate: Option<u32>,
    }

    /// Reference to a message (listing returns IDs only)
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageRef {
        pub id: String,
    }

    /// Full message from Gmail API (`format=full`)
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GmailMessage {
        pub id: String,
        #[serde(default)]
        pub snippet: String,
        pub payload: Option<MessagePayload>,
    }

    /// Message payload; only the top-level headers are read
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagePayload {
        pub headers: Option<Vec<Header>>,
    }

    /// Email header (name-value pair)
    #[derive(Debug, Clone, Deserialize, Serialize)]
    pub struct Header {
        pub name: String,
        pub value: String,
    }
}
