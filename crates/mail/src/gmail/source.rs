//! Remote message source abstraction

use anyhow::Result;

use super::api::{GmailMessage, ListMessagesResponse};
use crate::models::MessageId;

/// A paginated remote mailbox
///
/// Listing returns message IDs only; each ID is resolved to content with a
/// second call. Implementations own authentication and transport concerns.
pub trait MessageSource: Send + Sync {
    /// List one page of message IDs
    ///
    /// # Arguments
    /// * `max_results` - Page size requested from the remote (1-500)
    /// * `page_token` - Continuation cursor from the previous page, if any
    fn list_messages(
        &self,
        max_results: usize,
        page_token: Option<&str>,
    ) -> Result<ListMessagesResponse>;

    /// Resolve a single message ID to its full content
    fn get_message(&self, id: &MessageId) -> Result<GmailMessage>;
}
