//! Message selection criteria and canonical query rendering
//!
//! [`MessagesFilter`] captures human-facing selection criteria (date windows,
//! relative day-counts, size bounds, direction, status, task, page) and
//! renders them into the portal's canonical query string. Rendering is
//! deterministic: keys always appear in the same order, and timestamps are
//! converted to UTC at render time.

use crate::types::MessageStatus;
use chrono::{DateTime, Days, NaiveDate, Utc};

/// Fixed ISO-8601 second-precision format with a literal `Z` suffix.
const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Selection criteria for the listing and bulk-delete endpoints
///
/// The relative selectors interact by precedence, most specific wins:
/// `day` (exactly N days ago) produces a one-day window and overrides
/// everything else; otherwise `days` (last N days) replaces `min_date` and
/// `before` (older than N days) replaces `max_date`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessagesFilter {
    /// Regulatory task name
    pub task: Option<String>,

    /// Explicit lower creation-timestamp bound
    pub min_date: Option<DateTime<Utc>>,

    /// Explicit upper creation-timestamp bound
    pub max_date: Option<DateTime<Utc>>,

    /// Minimum total size in bytes
    pub min_size: Option<u64>,

    /// Maximum total size in bytes
    pub max_size: Option<u64>,

    /// Select inbound messages
    pub inbox: bool,

    /// Select outbound messages
    pub outbox: bool,

    /// Registration status
    pub status: Option<MessageStatus>,

    /// Page number, 1-based (0 and 1 both mean the server default first page)
    pub page: u32,

    /// Relative: messages from the last N days (replaces `min_date`)
    pub days: Option<u64>,

    /// Relative: messages older than N days (replaces `max_date`)
    pub before: Option<u64>,

    /// Exact: messages created exactly N days ago; produces the one-day
    /// window `[today-N, today-N+1)` and overrides every other date bound
    pub day: Option<u64>,
}

impl MessagesFilter {
    /// Filter that selects everything (dangerous for destructive calls).
    pub fn all() -> Self {
        Self::default()
    }

    /// Render the canonical query string for the current date.
    pub fn build(&self) -> String {
        self.build_at(Utc::now().date_naive())
    }

    /// Render the canonical query string, resolving relative day selectors
    /// against the supplied `today`. Split out for deterministic tests.
    pub fn build_at(&self, today: NaiveDate) -> String {
        let (min, max) = self.date_window(today);

        let mut pairs: Vec<(&str, String)> = Vec::new();
        if let Some(task) = &self.task {
            pairs.push(("Task", task.clone()));
        }
        if let Some(min) = min {
            pairs.push(("MinDateTime", min.format(DATE_FORMAT).to_string()));
        }
        if let Some(max) = max {
            pairs.push(("MaxDateTime", max.format(DATE_FORMAT).to_string()));
        }
        if let Some(size) = self.min_size {
            pairs.push(("MinSize", size.to_string()));
        }
        if let Some(size) = self.max_size {
            pairs.push(("MaxSize", size.to_string()));
        }
        // Direction is rendered only when exactly one side is selected;
        // both or neither means "both" and the key is omitted.
        if self.inbox != self.outbox {
            let value = if self.inbox { "inbox" } else { "outbox" };
            pairs.push(("Type", value.to_string()));
        }
        if let Some(status) = self.status {
            pairs.push(("Status", status.as_query_value().to_string()));
        }
        // First page is the server default
        if self.page > 1 {
            pairs.push(("Page", self.page.to_string()));
        }

        pairs
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// True iff the rendered query contains no `key=value` pairs.
    ///
    /// Callers must treat an empty filter as dangerous for destructive bulk
    /// operations; [`crate::client::PortalClient::delete_filtered`] rejects it.
    pub fn is_empty(&self) -> bool {
        !self.build().contains('=')
    }

    /// Resolve the effective `[min, max)` creation-date window.
    fn date_window(&self, today: NaiveDate) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        if let Some(n) = self.day {
            // Exact-day selector: one-day window, ignore everything else.
            let start = midnight_days_ago(today, n);
            let end = start.and_then(|s| s.checked_add_days(Days::new(1)));
            return (start, end.or(start));
        }

        let min = match self.days {
            Some(n) => midnight_days_ago(today, n),
            None => self.min_date,
        };
        let max = match self.before {
            Some(n) => midnight_days_ago(today, n),
            None => self.max_date,
        };
        (min, max)
    }
}

/// Midnight UTC of `today - n` days.
fn midnight_days_ago(today: NaiveDate, n: u64) -> Option<DateTime<Utc>> {
    today
        .checked_sub_days(Days::new(n))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
