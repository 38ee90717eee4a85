//! Page-by-page traversal of filtered message listings
//!
//! [`PageWalker`] is a pull cursor over the portal's paginated listing:
//! it fetches a page, hands messages out one at a time, and requests the
//! next page only when the buffer drains. Errors from the underlying fetch
//! surface directly; the walker stays usable afterwards.

use crate::client::PortalClient;
use crate::error::Result;
use crate::filter::MessagesFilter;
use crate::types::Message;
use std::collections::VecDeque;

/// Cursor over all messages matching a filter, across pages.
pub struct PageWalker<'a> {
    client: &'a PortalClient,
    filter: MessagesFilter,
    buffer: VecDeque<Message>,
    next_page: u32,
    finished: bool,
}

impl<'a> PageWalker<'a> {
    /// Start a walk at the filter's page (or page 1 when unset).
    pub fn new(client: &'a PortalClient, filter: MessagesFilter) -> Self {
        let start = filter.page.max(1);
        Self {
            client,
            filter,
            buffer: VecDeque::new(),
            next_page: start,
            finished: false,
        }
    }

    /// The next message, or `None` once every page is exhausted.
    ///
    /// # Errors
    ///
    /// Propagates any listing failure; a subsequent call retries the same
    /// page.
    pub async fn next(&mut self) -> Result<Option<Message>> {
        if let Some(message) = self.buffer.pop_front() {
            return Ok(Some(message));
        }
        if self.finished {
            return Ok(None);
        }

        let mut filter = self.filter.clone();
        filter.page = self.next_page;
        let (messages, pagination) = self.client.list_messages(&filter).await?;

        tracing::debug!(
            page = pagination.current_page,
            of = pagination.total_pages,
            records = messages.len(),
            "fetched listing page"
        );

        if !pagination.has_next() || messages.is_empty() {
            self.finished = true;
        }
        self.next_page = pagination.current_page + 1;
        self.buffer.extend(messages);
        Ok(self.buffer.pop_front())
    }

    /// Drain the walker into a vector.
    pub async fn collect_remaining(&mut self) -> Result<Vec<Message>> {
        let mut all = Vec::new();
        while let Some(message) = self.next().await? {
            all.push(message);
        }
        Ok(all)
    }
}
