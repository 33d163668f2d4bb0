//! Paginated retrieval of full records from a message source

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::HashSet;

use crate::gmail::api::GmailMessage;
use crate::gmail::{MessageSource, normalize_message};
use crate::models::{Email, MessageId};

/// Largest page the remote listing accepts
pub const MAX_PAGE_SIZE: usize = 500;

/// Upper bound on messages resolved at once
pub const MAX_CONCURRENCY: usize = 16;

/// Options controlling a fetch
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Stop after this many records; 0 fetches the whole mailbox
    pub max_results: usize,
    /// Messages resolved at once; 1 resolves strictly one at a time,
    /// values above [`MAX_CONCURRENCY`] are clamped
    pub concurrency: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_results: 0,
            concurrency: 1,
        }
    }
}

impl FetchOptions {
    /// Fetch at most `max_results` records (0 = all)
    pub fn limit(max_results: usize) -> Self {
        Self {
            max_results,
            ..Self::default()
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    fn fan_out(&self) -> usize {
        self.concurrency.clamp(1, MAX_CONCURRENCY)
    }
}

/// Advisory progress reported while fetching
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FetchProgress {
    /// Records resolved so far
    pub fetched: usize,
    /// Messages skipped because they could not be resolved
    pub skipped: usize,
    /// Listing pages retrieved so far
    pub pages: usize,
    /// Remote's estimate of the mailbox size, if reported
    pub total_estimate: Option<u32>,
}

/// Fetch records from `source`, following page tokens
///
/// With `max_results > 0` the fetch stops as soon as that many records are
/// resolved, mid-page if need be, and never lists or resolves more IDs than
/// it still needs. A message that fails to resolve is logged and skipped;
/// a failed listing call aborts the fetch.
///
/// `progress` is invoked after every batch of resolutions.
pub fn fetch_emails<F>(
    source: &dyn MessageSource,
    options: &FetchOptions,
    mut progress: F,
) -> Result<Vec<Email>>
where
    F: FnMut(&FetchProgress),
{
    let limit = (options.max_results > 0).then_some(options.max_results);
    let fan_out = options.fan_out();

    let pool = if fan_out > 1 {
        Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(fan_out)
                .build()
                .context("Failed to start fetch worker pool")?,
        )
    } else {
        None
    };

    let mut emails: Vec<Email> = Vec::new();
    let mut seen: HashSet<MessageId> = HashSet::new();
    let mut state = FetchProgress::default();
    let mut page_token: Option<String> = None;
    let mut used_tokens: HashSet<String> = HashSet::new();

    loop {
        let remaining = limit.map(|l| l - emails.len());
        let page_size = remaining.map_or(MAX_PAGE_SIZE, |r| r.min(MAX_PAGE_SIZE));

        debug!(
            "Listing page {} (size {}, token {:?})",
            state.pages + 1,
            page_size,
            page_token
        );
        let page = source
            .list_messages(page_size, page_token.as_deref())
            .with_context(|| format!("Failed to list messages (page {})", state.pages + 1))?;

        state.pages += 1;
        if page.result_size_estimate.is_some() {
            state.total_estimate = page.result_size_estimate;
        }

        // Pages can overlap when the mailbox changes mid-fetch
        let ids: Vec<MessageId> = page
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|m| MessageId::new(m.id))
            .filter(|id| seen.insert(id.clone()))
            .collect();

        let mut cursor = 0;
        while cursor < ids.len() {
            let needed = limit.map_or(usize::MAX, |l| l - emails.len());
            if needed == 0 {
                break;
            }

            let batch = &ids[cursor..(cursor + needed.min(fan_out)).min(ids.len())];
            let results: Vec<Result<GmailMessage>> = match &pool {
                Some(pool) => pool.install(|| {
                    batch
                        .par_iter()
                        .map(|id| source.get_message(id))
                        .collect()
                }),
                None => batch.iter().map(|id| source.get_message(id)).collect(),
            };

            for (id, result) in batch.iter().zip(results) {
                match result {
                    Ok(message) => {
                        emails.push(normalize_message(message));
                        state.fetched += 1;
                    }
                    Err(e) => {
                        warn!("Skipping message {}: {:#}", id, e);
                        state.skipped += 1;
                    }
                }
            }

            cursor += batch.len();
            progress(&state);
        }

        if limit.is_some_and(|l| emails.len() >= l) {
            debug!("Reached limit of {} messages", emails.len());
            break;
        }

        let Some(token) = page.next_page_token.filter(|t| !t.is_empty()) else {
            break;
        };
        if ids.is_empty() {
            warn!("Page {} listed no new messages, stopping", state.pages);
            break;
        }
        if !used_tokens.insert(token.clone()) {
            warn!("Listing returned page token {:?} again, stopping", token);
            break;
        }
        page_token = Some(token);
    }

    progress(&state);
    info!(
        "Fetched {} messages over {} pages ({} skipped)",
        state.fetched, state.pages, state.skipped
    );
    Ok(emails)
}
