//! Core types for portal-sync

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Maximum records per page, fixed by the portal contract.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Unique identifier for a portal message (opaque string assigned by the portal)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    /// Create a new MessageId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message direction relative to this client
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Received from the portal
    Inbox,
    /// Sent to the portal
    Outbox,
}

impl Direction {
    /// Label used in query strings and archive paths
    pub fn label(&self) -> &'static str {
        match self {
            Direction::Inbox => "inbox",
            Direction::Outbox => "outbox",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Registration status of a portal message
///
/// `Registered` and `Success` are terminal success states; `Error` and
/// `Rejected` are terminal failures. Everything else is still in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Created locally, not yet submitted
    Draft,
    /// Submitted to the portal
    Sent,
    /// Accepted by the portal transport layer
    Delivered,
    /// Being processed by the regulator
    Processing,
    /// Durably registered (terminal success)
    Registered,
    /// Completed without a registration step (terminal success)
    Success,
    /// Terminal failure reported by the portal
    Error,
    /// Rejected by the regulator (terminal failure)
    Rejected,
    /// Status string not in the known set
    #[serde(other)]
    Unknown,
}

impl MessageStatus {
    /// Whether no further state transition is expected
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MessageStatus::Registered
                | MessageStatus::Success
                | MessageStatus::Error
                | MessageStatus::Rejected
        )
    }

    /// Whether the portal has durably accepted the message
    pub fn is_accepted(&self) -> bool {
        matches!(self, MessageStatus::Registered | MessageStatus::Success)
    }

    /// Whether the portal has terminally refused the message
    pub fn is_failed(&self) -> bool {
        matches!(self, MessageStatus::Error | MessageStatus::Rejected)
    }

    /// Query-string value for this status
    pub fn as_query_value(&self) -> &'static str {
        match self {
            MessageStatus::Draft => "draft",
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Processing => "processing",
            MessageStatus::Registered => "registered",
            MessageStatus::Success => "success",
            MessageStatus::Error => "error",
            MessageStatus::Rejected => "rejected",
            MessageStatus::Unknown => "unknown",
        }
    }
}

/// One unit of exchange with the portal
///
/// Messages are read-only projections of server state, fetched fresh on each
/// call and never mutated locally.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Opaque message identifier
    pub id: MessageId,

    /// Links a response to its originating request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<MessageId>,

    /// Direction of exchange
    #[serde(rename = "type")]
    pub direction: Direction,

    /// Creation timestamp (UTC)
    pub creation_date: DateTime<Utc>,

    /// Current registration status
    pub status: MessageStatus,

    /// Regulatory process this message belongs to
    pub task_name: String,

    /// Total payload size in bytes
    #[serde(default)]
    pub total_size: u64,

    /// File payloads attached to this message
    #[serde(default)]
    pub files: Vec<MessageFile>,

    /// Receipt trail (outbound messages only)
    #[serde(default)]
    pub receipts: Vec<MessageReceipt>,
}

impl Message {
    /// Whether this message was received from the portal
    pub fn is_inbox(&self) -> bool {
        self.direction == Direction::Inbox
    }

    /// Whether this message was sent to the portal
    pub fn is_outbox(&self) -> bool {
        self.direction == Direction::Outbox
    }

    /// The newest receipt in a terminal-failure status, preferring one that
    /// carries a human-readable message.
    pub fn newest_failure_receipt(&self) -> Option<&MessageReceipt> {
        let mut failed: Vec<&MessageReceipt> = self
            .receipts
            .iter()
            .filter(|r| r.status.is_failed())
            .collect();
        failed.sort_by_key(|r| r.receive_date);
        failed
            .iter()
            .rev()
            .find(|r| r.message.as_deref().is_some_and(|m| !m.is_empty()))
            .or_else(|| failed.last())
            .copied()
    }
}

/// One file payload inside a [`Message`]
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageFile {
    /// Opaque file identifier
    pub id: MessageId,

    /// File name as stored on the portal
    pub name: String,

    /// Whether the file bytes are encrypted
    #[serde(default)]
    pub encrypted: bool,

    /// For detached-signature files: the id of the file this one signs.
    /// A file with this set is itself a signature artifact and must never
    /// be decrypted as content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_file: Option<MessageId>,

    /// File size in bytes
    #[serde(default)]
    pub size: u64,

    /// Repository locations where the file is stored
    #[serde(default)]
    pub repositories: Vec<String>,
}

impl MessageFile {
    /// Whether this file is a detached signature over another file
    pub fn is_signature(&self) -> bool {
        self.signed_file.is_some()
    }
}

/// One entry in a message's receipt trail
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReceipt {
    /// Opaque receipt identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,

    /// When the receipt was produced
    pub receive_date: DateTime<Utc>,

    /// Status reported by this receipt
    pub status: MessageStatus,

    /// Human-readable detail (error receipts usually carry one)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Pagination counters reported by the listing endpoint
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Total records matching the filter
    pub total_records: u64,

    /// Total pages
    pub total_pages: u32,

    /// Current page index (1-based)
    pub current_page: u32,

    /// Records on the current page
    pub records_on_page: u32,

    /// Records on the next page, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records_on_next_page: Option<u32>,
}

impl Pagination {
    /// Whether a page after the current one exists
    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }
}

/// Human-readable summary of one processed message
///
/// Built by the extraction pipeline from the message's well-known form file,
/// best-effort: individual file failures become notes instead of errors.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MessageInfo {
    /// Message identifier
    pub id: String,

    /// Direction label
    pub direction: String,

    /// Regulatory task name
    pub task_name: String,

    /// Creation timestamp, rendered
    pub created: String,

    /// Subject extracted from the form file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Counterpart (sender or recipient) extracted from the form file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterpart: Option<String>,

    /// Key document date extracted from the form file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_date: Option<String>,

    /// Deliverable files written to the destination directory
    #[serde(default)]
    pub deliverables: Vec<PathBuf>,

    /// Notes accumulated during processing (skips, failures, reply links)
    #[serde(default)]
    pub notes: Vec<String>,
}

impl MessageInfo {
    /// Render the transcript written to `info.txt`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Message:  {}\n", self.id));
        out.push_str(&format!("Direction: {}\n", self.direction));
        out.push_str(&format!("Task:     {}\n", self.task_name));
        out.push_str(&format!("Created:  {}\n", self.created));
        if let Some(subject) = &self.subject {
            out.push_str(&format!("Subject:  {}\n", subject));
        }
        if let Some(counterpart) = &self.counterpart {
            out.push_str(&format!("Counterpart: {}\n", counterpart));
        }
        if let Some(date) = &self.document_date {
            out.push_str(&format!("Document date: {}\n", date));
        }
        if !self.deliverables.is_empty() {
            out.push_str("Files:\n");
            for path in &self.deliverables {
                if let Some(name) = path.file_name() {
                    out.push_str(&format!("  - {}\n", name.to_string_lossy()));
                }
            }
        }
        if !self.notes.is_empty() {
            out.push_str("Notes:\n");
            for note in &self.notes {
                out.push_str(&format!("  - {}\n", note));
            }
        }
        out
    }
}

/// Outcome summary of a filtered batch run
#[derive(Clone, Debug, Default)]
pub struct SyncReport {
    /// Messages successfully processed (archived or legitimately skipped)
    pub processed: usize,

    /// Messages that failed with a recoverable error
    pub errors: usize,

    /// Numbered per-message report lines
    pub lines: Vec<String>,
}

impl SyncReport {
    /// Append a per-message outcome line, numbering it.
    pub fn push(&mut self, line: impl Into<String>) {
        let n = self.lines.len() + 1;
        self.lines.push(format!("{}. {}", n, line.into()));
    }

    /// Render the digest body.
    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push_str(&format!(
            "\n\nProcessed: {}, errors: {}\n",
            self.processed, self.errors
        ));
        out
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn receipt(
        minutes: u32,
        status: MessageStatus,
        message: Option<&str>,
    ) -> MessageReceipt {
        MessageReceipt {
            id: None,
            receive_date: Utc.with_ymd_and_hms(2024, 5, 1, 10, minutes, 0).unwrap(),
            status,
            message: message.map(str::to_string),
        }
    }

    fn message_with_receipts(receipts: Vec<MessageReceipt>) -> Message {
        Message {
            id: MessageId::from("m-1"),
            correlation_id: None,
            direction: Direction::Outbox,
            creation_date: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
            status: MessageStatus::Error,
            task_name: "quarterly-report".into(),
            total_size: 0,
            files: vec![],
            receipts,
        }
    }

    // --- MessageStatus classification ---

    #[test]
    fn terminal_statuses_are_exactly_the_four() {
        let terminal = [
            MessageStatus::Registered,
            MessageStatus::Success,
            MessageStatus::Error,
            MessageStatus::Rejected,
        ];
        let non_terminal = [
            MessageStatus::Draft,
            MessageStatus::Sent,
            MessageStatus::Delivered,
            MessageStatus::Processing,
            MessageStatus::Unknown,
        ];

        for status in terminal {
            assert!(status.is_terminal(), "{status:?} must be terminal");
        }
        for status in non_terminal {
            assert!(!status.is_terminal(), "{status:?} must not be terminal");
        }
    }

    #[test]
    fn accepted_excludes_failures() {
        assert!(MessageStatus::Registered.is_accepted());
        assert!(MessageStatus::Success.is_accepted());
        assert!(!MessageStatus::Error.is_accepted());
        assert!(!MessageStatus::Rejected.is_accepted());
        assert!(!MessageStatus::Processing.is_accepted());
    }

    #[test]
    fn unknown_status_string_deserializes_to_unknown() {
        let status: MessageStatus = serde_json::from_str("\"weird-new-state\"").unwrap();
        assert_eq!(status, MessageStatus::Unknown);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&MessageStatus::Registered).unwrap(),
            "\"registered\""
        );
    }

    // --- Direction ---

    #[test]
    fn direction_booleans_are_mutually_exclusive() {
        let mut msg = message_with_receipts(vec![]);
        msg.direction = Direction::Inbox;
        assert!(msg.is_inbox() && !msg.is_outbox());
        msg.direction = Direction::Outbox;
        assert!(msg.is_outbox() && !msg.is_inbox());
    }

    // --- Receipt selection ---

    #[test]
    fn newest_failure_receipt_prefers_one_with_message() {
        let msg = message_with_receipts(vec![
            receipt(0, MessageStatus::Sent, None),
            receipt(5, MessageStatus::Error, Some("quota exceeded")),
            receipt(10, MessageStatus::Error, None),
        ]);

        let picked = msg.newest_failure_receipt().unwrap();
        assert_eq!(picked.message.as_deref(), Some("quota exceeded"));
    }

    #[test]
    fn newest_failure_receipt_picks_newest_among_carriers() {
        let msg = message_with_receipts(vec![
            receipt(1, MessageStatus::Rejected, Some("old detail")),
            receipt(9, MessageStatus::Error, Some("new detail")),
        ]);

        let picked = msg.newest_failure_receipt().unwrap();
        assert_eq!(picked.message.as_deref(), Some("new detail"));
    }

    #[test]
    fn newest_failure_receipt_falls_back_to_messageless() {
        let msg = message_with_receipts(vec![
            receipt(0, MessageStatus::Sent, Some("irrelevant")),
            receipt(5, MessageStatus::Rejected, None),
        ]);

        let picked = msg.newest_failure_receipt().unwrap();
        assert_eq!(picked.status, MessageStatus::Rejected);
        assert!(picked.message.is_none());
    }

    #[test]
    fn newest_failure_receipt_none_without_failures() {
        let msg = message_with_receipts(vec![receipt(0, MessageStatus::Delivered, None)]);
        assert!(msg.newest_failure_receipt().is_none());
    }

    // --- Wire format ---

    #[test]
    fn message_deserializes_from_portal_json() {
        let json = r#"{
            "id": "a1b2",
            "correlationId": "req-9",
            "type": "inbox",
            "creationDate": "2024-05-01T09:30:00Z",
            "status": "success",
            "taskName": "quarterly-report",
            "totalSize": 2048,
            "files": [
                {
                    "id": "f-1",
                    "name": "report.xml.enc",
                    "encrypted": true,
                    "size": 1024
                },
                {
                    "id": "f-2",
                    "name": "report.xml.sig",
                    "signedFile": "f-1",
                    "size": 256
                }
            ],
            "receipts": []
        }"#;

        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.id.as_str(), "a1b2");
        assert_eq!(msg.correlation_id.as_ref().unwrap().as_str(), "req-9");
        assert!(msg.is_inbox());
        assert_eq!(msg.files.len(), 2);
        assert!(msg.files[0].encrypted);
        assert!(!msg.files[0].is_signature());
        assert!(msg.files[1].is_signature());
    }

    #[test]
    fn message_tolerates_missing_optional_fields() {
        let json = r#"{
            "id": "a1b2",
            "type": "outbox",
            "creationDate": "2024-05-01T09:30:00Z",
            "status": "processing",
            "taskName": "t"
        }"#;

        let msg: Message = serde_json::from_str(json).unwrap();
        assert!(msg.correlation_id.is_none());
        assert!(msg.files.is_empty());
        assert!(msg.receipts.is_empty());
        assert_eq!(msg.total_size, 0);
    }

    #[test]
    fn pagination_has_next_respects_totals() {
        let page = Pagination {
            total_records: 250,
            total_pages: 3,
            current_page: 3,
            records_on_page: 50,
            records_on_next_page: None,
        };
        assert!(!page.has_next());

        let page = Pagination {
            current_page: 1,
            records_on_next_page: Some(100),
            ..page
        };
        assert!(page.has_next());
    }

    // --- Reporting ---

    #[test]
    fn sync_report_numbers_lines() {
        let mut report = SyncReport::default();
        report.push("message one archived");
        report.push("message two failed");

        assert_eq!(report.lines[0], "1. message one archived");
        assert_eq!(report.lines[1], "2. message two failed");
    }

    #[test]
    fn sync_report_render_contains_counts() {
        let mut report = SyncReport {
            processed: 2,
            errors: 1,
            ..Default::default()
        };
        report.push("ok");
        let rendered = report.render();
        assert!(rendered.contains("Processed: 2"));
        assert!(rendered.contains("errors: 1"));
    }

    #[test]
    fn message_info_render_lists_notes_and_files() {
        let info = MessageInfo {
            id: "m-1".into(),
            direction: "inbox".into(),
            task_name: "t".into(),
            created: "2024-05-01".into(),
            subject: Some("Quarterly filing".into()),
            counterpart: None,
            document_date: None,
            deliverables: vec![PathBuf::from("/dest/report.xml")],
            notes: vec!["file extra.bin missing, skipped".into()],
        };

        let rendered = info.render();
        assert!(rendered.contains("Quarterly filing"));
        assert!(rendered.contains("report.xml"));
        assert!(rendered.contains("extra.bin missing"));
    }
}
