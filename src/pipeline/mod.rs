//! Message processing pipeline
//!
//! The pipeline drives one message from the portal into the on-disk
//! archive and the extracted-documents tree. Its idempotency ledger is
//! the filesystem itself: a message whose manifest and bundle (or
//! tombstone) already exist is finished and costs no network traffic on
//! later runs. Batch processing absorbs recoverable per-message failures
//! into a [`SyncReport`] and only aborts on transport-level errors.

mod extract;

pub use extract::{unpack_bundle, Extractor};

use crate::archive::{Archive, ArchiveEntry};
use crate::client::PortalClient;
use crate::config::{Config, NotifyMode};
use crate::crypto::CryptoProvider;
use crate::error::{Error, Result};
use crate::filter::MessagesFilter;
use crate::notify::{notify_best_effort, Notifier};
use crate::pages::PageWalker;
use crate::types::{Message, MessageId, MessageInfo, SyncReport};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened to one message
#[derive(Debug)]
pub enum ProcessOutcome {
    /// Archived and extracted in this run
    Archived(MessageInfo),
    /// Ledger already complete, nothing fetched
    AlreadyArchived,
    /// Outbound message not yet accepted by the portal
    SkippedPending,
    /// Task name is on the exclusion list
    SkippedExcluded,
    /// Bundle is unobtainable, a tombstone now blocks further attempts
    Tombstoned {
        /// Why the bundle could not be obtained
        reason: String,
    },
}

impl ProcessOutcome {
    /// One-line description used in reports.
    fn describe(&self, id: &MessageId) -> String {
        match self {
            ProcessOutcome::Archived(info) => {
                let subject = info.subject.as_deref().unwrap_or("-");
                format!("{id}: archived ({} files, subject: {subject})", info.deliverables.len())
            }
            ProcessOutcome::AlreadyArchived => format!("{id}: already archived"),
            ProcessOutcome::SkippedPending => format!("{id}: skipped, not yet accepted"),
            ProcessOutcome::SkippedExcluded => format!("{id}: skipped, task excluded"),
            ProcessOutcome::Tombstoned { reason } => format!("{id}: tombstoned ({reason})"),
        }
    }
}

/// Drives messages from the portal into the archive
pub struct MessagePipeline {
    client: PortalClient,
    archive: Archive,
    extractor: Extractor,
    notifier: Arc<dyn Notifier>,
    work_dir: PathBuf,
    excluded_tasks: Vec<String>,
    notify_mode: NotifyMode,
}

impl MessagePipeline {
    /// Assemble the pipeline from configuration plus its collaborators.
    pub fn new(
        config: &Config,
        client: PortalClient,
        crypto: Arc<dyn CryptoProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            client,
            archive: Archive::new(
                config.archive.archive_root.clone(),
                config.archive.doc_root.clone(),
            ),
            extractor: Extractor::new(crypto),
            notifier,
            work_dir: config.archive.work_dir.clone(),
            excluded_tasks: config.archive.excluded_tasks.clone(),
            notify_mode: config.notify.mode,
        }
    }

    /// The portal client, e.g. for deletion or direct listing.
    pub fn client(&self) -> &PortalClient {
        &self.client
    }

    /// Fetch one message by id and process it.
    pub async fn process_one(&self, id: &MessageId) -> Result<ProcessOutcome> {
        let message = self.client.get_message(id).await?;
        let outcome = self.process_message(&message).await?;
        if self.notify_mode == NotifyMode::Immediate {
            notify_best_effort(
                self.notifier.as_ref(),
                &format!("Message {id} processed"),
                &outcome.describe(id),
            )
            .await;
        }
        Ok(outcome)
    }

    /// Process every message matching `filter`, page by page.
    ///
    /// Recoverable per-message failures are recorded in the report and do
    /// not stop the batch; transport failures and cancellation abort it.
    pub async fn process_filtered(&self, filter: &MessagesFilter) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let mut walker = PageWalker::new(&self.client, filter.clone());

        while let Some(message) = walker.next().await? {
            match self.process_message(&message).await {
                Ok(outcome) => {
                    report.processed += 1;
                    let line = outcome.describe(&message.id);
                    if self.notify_mode == NotifyMode::Immediate {
                        if let ProcessOutcome::Archived(_) | ProcessOutcome::Tombstoned { .. } =
                            outcome
                        {
                            notify_best_effort(
                                self.notifier.as_ref(),
                                &format!("Message {} processed", message.id),
                                &line,
                            )
                            .await;
                        }
                    }
                    report.push(line);
                }
                Err(e) if e.is_recoverable() => {
                    warn!(id = %message.id, error = %e, "message failed, batch continues");
                    report.errors += 1;
                    report.push(format!("{}: failed ({})", message.id, e));
                }
                Err(e) => return Err(e),
            }
        }

        if self.notify_mode == NotifyMode::Digest && !report.lines.is_empty() {
            notify_best_effort(
                self.notifier.as_ref(),
                &format!(
                    "Synchronization report: {} processed, {} errors",
                    report.processed, report.errors
                ),
                &report.render(),
            )
            .await;
        }

        info!(
            processed = report.processed,
            errors = report.errors,
            "batch complete"
        );
        Ok(report)
    }

    /// Archive and extract a single already-fetched message.
    pub async fn process_message(&self, message: &Message) -> Result<ProcessOutcome> {
        if message.is_outbox() && !message.status.is_accepted() {
            debug!(id = %message.id, status = ?message.status, "outbound message not accepted yet");
            return Ok(ProcessOutcome::SkippedPending);
        }
        if self.excluded_tasks.iter().any(|t| t == &message.task_name) {
            debug!(id = %message.id, task = %message.task_name, "task excluded");
            return Ok(ProcessOutcome::SkippedExcluded);
        }

        let entry = self.archive.entry(message);
        let bundle_settled =
            self.archive.has_bundle(&entry) || self.archive.has_tombstone(&entry);
        if self.archive.has_manifest(&entry) && bundle_settled {
            return Ok(ProcessOutcome::AlreadyArchived);
        }

        if !self.archive.has_manifest(&entry) {
            self.archive.write_manifest(&entry, message).await?;
        }

        if self.archive.has_tombstone(&entry) {
            return Ok(ProcessOutcome::AlreadyArchived);
        }

        if !self.archive.has_bundle(&entry) {
            match self.obtain_bundle(message, &entry).await? {
                BundleOutcome::Stored => {}
                BundleOutcome::Tombstoned { reason } => {
                    return Ok(ProcessOutcome::Tombstoned { reason });
                }
            }
        }

        let info = self.extract(message, &entry).await?;
        Ok(ProcessOutcome::Archived(info))
    }

    /// Download the bundle, falling back to per-file downloads. When both
    /// paths fail with a message-level error a tombstone stops future
    /// attempts.
    async fn obtain_bundle(
        &self,
        message: &Message,
        entry: &ArchiveEntry,
    ) -> Result<BundleOutcome> {
        let bundle_error = match self.client.download_bundle(&message.id).await {
            Ok(bytes) => {
                self.archive.write_bundle(entry, &bytes).await?;
                return Ok(BundleOutcome::Stored);
            }
            Err(e) if e.is_recoverable() => e,
            Err(e) => return Err(e),
        };

        warn!(
            id = %message.id,
            error = %bundle_error,
            "bundle download failed, trying individual files"
        );

        match self.download_files_as_bundle(message).await {
            Ok(bytes) => {
                self.archive.write_bundle(entry, &bytes).await?;
                Ok(BundleOutcome::Stored)
            }
            Err(e) if e.is_recoverable() => {
                let reason = format!("bundle: {bundle_error}; per-file: {e}");
                self.archive.write_tombstone(entry, &reason).await?;
                Ok(BundleOutcome::Tombstoned { reason })
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch each payload individually and assemble a bundle-shaped zip,
    /// so the ledger looks the same regardless of the download path.
    async fn download_files_as_bundle(&self, message: &Message) -> Result<Vec<u8>> {
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::FileOptions::default();
            for file in &message.files {
                let bytes = self.client.download_file(&message.id, &file.id.0).await?;
                writer
                    .start_file(file.name.as_str(), options)
                    .map_err(|e| Error::Other(format!("failed to assemble bundle: {e}")))?;
                writer.write_all(&bytes)?;
            }
            writer
                .finish()
                .map_err(|e| Error::Other(format!("failed to assemble bundle: {e}")))?;
        }
        Ok(cursor.into_inner())
    }

    async fn extract(&self, message: &Message, entry: &ArchiveEntry) -> Result<MessageInfo> {
        let work_dir = self.work_dir.join(message.id.to_string());
        let extracted = unpack_bundle(&entry.bundle, &work_dir)?;
        debug!(id = %message.id, files = extracted.len(), "bundle unpacked for extraction");

        self.refetch_missing(message, &work_dir).await;

        // Best effort: the originating message only enriches the
        // transcript's reply note.
        let correlated = match &message.correlation_id {
            Some(id) => match self.client.get_message(id).await {
                Ok(original) => Some(original),
                Err(e) => {
                    debug!(id = %id, error = %e, "correlated message not fetched");
                    None
                }
            },
            None => None,
        };

        let info = self
            .extractor
            .extract_message(message, &work_dir, &entry.dest_dir, correlated.as_ref())
            .await?;

        if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
            debug!(?work_dir, error = %e, "work directory not fully removed");
        }
        Ok(info)
    }

    /// One re-download attempt for payloads the bundle should contain but
    /// does not. A file still missing afterwards becomes a transcript note.
    async fn refetch_missing(&self, message: &Message, work_dir: &Path) {
        for file in &message.files {
            if file.is_signature() || work_dir.join(&file.name).is_file() {
                continue;
            }
            match self.client.download_file(&message.id, &file.id.0).await {
                Ok(bytes) => {
                    if let Err(e) = tokio::fs::write(work_dir.join(&file.name), bytes).await {
                        warn!(name = %file.name, error = %e, "re-downloaded payload not written");
                    }
                }
                Err(e) => {
                    warn!(name = %file.name, error = %e, "payload missing from bundle and re-download failed");
                }
            }
        }
    }
}

enum BundleOutcome {
    Stored,
    Tombstoned { reason: String },
}
