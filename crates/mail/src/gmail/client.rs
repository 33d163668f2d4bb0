//! Gmail API HTTP client
//!
//! Provides methods for listing and fetching messages from the Gmail API.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use std::time::Duration;
use url::Url;

use super::api::{GmailMessage, ListMessagesResponse};
use super::{AccessTokenProvider, MessageSource};
use crate::models::MessageId;

/// Gmail API client for listing and fetching messages
pub struct GmailClient {
    auth: Box<dyn AccessTokenProvider>,
    base_url: String,
    user: String,
    max_retries: u32,
}

impl GmailClient {
    /// Gmail API base URL
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";

    /// Largest page the listing endpoint accepts
    pub const MAX_PAGE_SIZE: usize = 500;

    /// Create a new Gmail client for the authenticated user ("me")
    pub fn new(auth: impl AccessTokenProvider + 'static) -> Self {
        Self {
            auth: Box::new(auth),
            base_url: Self::BASE_URL.to_string(),
            user: "me".to_string(),
            max_retries: 3,
        }
    }

    /// Target a different mailbox user ID
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Point the client at a different API root (e.g. a local stub)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Attempts per message fetch before giving up (minimum 1)
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Build the listing URL for one page
    fn list_url(&self, max_results: usize, page_token: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/users/{}/messages", self.base_url, self.user))
            .context("Invalid Gmail API base URL")?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair(
                "maxResults",
                &max_results.clamp(1, Self::MAX_PAGE_SIZE).to_string(),
            );
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }

        Ok(url)
    }

    /// Build the URL for a single message in full format
    fn message_url(&self, id: &MessageId) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).context("Invalid Gmail API base URL")?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Gmail API base URL cannot have path segments"))?
            .extend(["users", self.user.as_str(), "messages", id.as_str()]);
        url.query_pairs_mut().append_pair("format", "full");
        Ok(url)
    }

    /// Fetch one message without retrying
    fn fetch_message(&self, id: &MessageId) -> Result<GmailMessage> {
        let access_token = self.auth.access_token()?;
        let url = self.message_url(id)?;

        let mut response = ureq::get(url.as_str())
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .with_context(|| format!("Failed to send get message request for {}", id))?;

        let message: GmailMessage = response
            .body_mut()
            .read_json()
            .with_context(|| format!("Failed to parse message response for {}", id))?;

        Ok(message)
    }

    /// Get a message with exponential backoff retry
    fn get_message_with_retry(&self, id: &MessageId) -> Result<GmailMessage> {
        let mut delay = Duration::from_millis(100);
        let mut attempt = 1;

        loop {
            match self.fetch_message(id) {
                Ok(msg) => return Ok(msg),
                Err(e) if attempt >= self.max_retries => return Err(e),
                Err(e) => {
                    log::debug!("Retrying message {} after attempt {}: {:#}", id, attempt, e);
                    let jitter = Duration::from_millis(rand_jitter());
                    std::thread::sleep(delay + jitter);
                    delay *= 2;
                    attempt += 1;
                }
            }
        }
    }
}

impl MessageSource for GmailClient {
    fn list_messages(
        &self,
        max_results: usize,
        page_token: Option<&str>,
    ) -> Result<ListMessagesResponse> {
        let access_token = self.auth.access_token()?;
        let url = self.list_url(max_results, page_token)?;

        let mut response = ureq::get(url.as_str())
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .context("Failed to send list messages request")?;

        let list: ListMessagesResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse list messages response")?;

        Ok(list)
    }

    fn get_message(&self, id: &MessageId) -> Result<GmailMessage> {
        self.get_message_with_retry(id)
    }
}

/// Generate a random jitter value (0-100ms)
fn rand_jitter() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let hasher = RandomState::new().build_hasher();
    hasher.finish() % 100
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::StaticToken;

    fn client() -> GmailClient {
        GmailClient::new(StaticToken::new("token"))
    }

    #[test]
    fn test_list_url_caps_page_size() {
        let url = client().list_url(10_000, None).unwrap();
        assert_eq!(
            url.as_str(),
            "https://gmail.googleapis.com/gmail/v1/users/me/messages?maxResults=500"
        );
    }

    #[test]
    fn test_list_url_encodes_page_token() {
        let url = client().list_url(25, Some("abc+/=")).unwrap();
        assert_eq!(url.query(), Some("maxResults=25&pageToken=abc%2B%2F%3D"));
    }

    #[test]
    fn test_message_url_requests_full_format() {
        let url = client()
            .with_base_url("http://localhost:9000/gmail/v1/")
            .message_url(&MessageId::new("18c2f0a"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9000/gmail/v1/users/me/messages/18c2f0a?format=full"
        );
    }

    #[test]
    fn test_with_user() {
        let url = client().with_user("someone@example.com").list_url(1, None).unwrap();
        assert!(url.path().ends_with("/users/someone@example.com/messages"));
    }
}
