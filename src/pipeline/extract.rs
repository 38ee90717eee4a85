//! Document extraction: from an archived bundle to a readable folder
//!
//! Extraction turns the raw bundle of one message into a destination
//! directory of plain documents: ciphertext is decrypted, enveloping
//! signature containers are removed, detached signatures are skipped, and
//! a human-readable `info.txt` transcript summarises the result. Per-file
//! failures become notes in the transcript; the only fatal condition is a
//! destination directory that cannot be created.

use crate::crypto::CryptoProvider;
use crate::error::{Error, ExtractionError, Result};
use crate::types::{Message, MessageInfo};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// File name of the transcript written to every destination directory.
const INFO_FILE: &str = "info.txt";

/// Unpack a bundle zip into `work_dir`, returning the extracted paths.
///
/// Entries with unsafe names (absolute or escaping the destination) are
/// skipped with a warning.
///
/// # Errors
///
/// `ExtractionError::BundleUnreadable` when the archive cannot be opened
/// or an entry cannot be read.
pub fn unpack_bundle(bundle: &Path, work_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(work_dir)?;

    let file = std::fs::File::open(bundle).map_err(|e| ExtractionError::BundleUnreadable {
        archive: bundle.to_path_buf(),
        reason: format!("failed to open bundle: {e}"),
    })?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| ExtractionError::BundleUnreadable {
            archive: bundle.to_path_buf(),
            reason: format!("failed to read bundle: {e}"),
        })?;

    let mut extracted = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ExtractionError::BundleUnreadable {
                archive: bundle.to_path_buf(),
                reason: format!("failed to read entry {i}: {e}"),
            })?;

        let entry_path = match entry.enclosed_name() {
            Some(path) => work_dir.join(path),
            None => {
                warn!(entry = entry.name(), "skipping entry with unsafe path");
                continue;
            }
        };

        if entry.is_dir() {
            std::fs::create_dir_all(&entry_path)?;
            continue;
        }
        if let Some(parent) = entry_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = std::fs::File::create(&entry_path)?;
        std::io::copy(&mut entry, &mut out)?;
        extracted.push(entry_path);
    }

    debug!(?bundle, count = extracted.len(), "bundle unpacked");
    Ok(extracted)
}

/// Turns unpacked message files into readable documents
pub struct Extractor {
    crypto: Arc<dyn CryptoProvider>,
    form_fields: FormFieldPatterns,
}

/// Pre-compiled patterns for the light-weight form summary.
struct FormFieldPatterns {
    subject: Regex,
    counterpart: Regex,
    document_date: Regex,
}

impl FormFieldPatterns {
    fn new() -> Self {
        // The form files are small flat XML documents; a tag-text scan is
        // enough for the transcript and avoids a full XML dependency.
        Self {
            subject: tag_pattern(&["subject", "title", "theme"]),
            counterpart: tag_pattern(&["sender", "recipient", "counterpart", "organization"]),
            document_date: tag_pattern(&["documentDate", "docDate", "date"]),
        }
    }
}

// Patterns are built from fixed tag names and always compile.
#[allow(clippy::unwrap_used)]
fn tag_pattern(tags: &[&str]) -> Regex {
    let alternatives = tags.join("|");
    Regex::new(&format!(r"(?is)<(?:{alternatives})\s*>\s*([^<]+?)\s*</")).unwrap()
}

impl Extractor {
    /// Build an extractor over the given crypto provider.
    pub fn new(crypto: Arc<dyn CryptoProvider>) -> Self {
        Self {
            crypto,
            form_fields: FormFieldPatterns::new(),
        }
    }

    /// Process every payload of `message` from `source_dir` into
    /// `dest_dir` and write the transcript.
    ///
    /// `correlated` is the originating message when this one is a reply
    /// and the caller managed to fetch it; it only enriches the
    /// transcript.
    ///
    /// Per-file problems (missing payload, failed decryption) degrade to
    /// transcript notes.
    ///
    /// # Errors
    ///
    /// `ExtractionError::CreateDirFailed` when the destination directory
    /// cannot be created; this is the only error that aborts extraction.
    pub async fn extract_message(
        &self,
        message: &Message,
        source_dir: &Path,
        dest_dir: &Path,
        correlated: Option<&Message>,
    ) -> Result<MessageInfo> {
        tokio::fs::create_dir_all(dest_dir).await.map_err(|e| {
            Error::Extraction(ExtractionError::CreateDirFailed {
                path: dest_dir.to_path_buf(),
                reason: e.to_string(),
            })
        })?;

        let mut summary = MessageInfo {
            id: message.id.to_string(),
            direction: message.direction.label().to_string(),
            task_name: message.task_name.clone(),
            created: message.creation_date.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            subject: None,
            counterpart: None,
            document_date: None,
            deliverables: Vec::new(),
            notes: Vec::new(),
        };

        if let Some(correlation) = &message.correlation_id {
            let note = match correlated {
                Some(original) => format!(
                    "In reply to message {correlation} ({}, created {})",
                    original.task_name,
                    original.creation_date.format("%Y-%m-%d")
                ),
                None => format!("In reply to message {correlation}"),
            };
            summary.notes.push(note);
        }

        for file in &message.files {
            if file.is_signature() {
                debug!(name = %file.name, "skipping detached signature");
                summary
                    .notes
                    .push(format!("Skipped detached signature {}", file.name));
                continue;
            }

            let source = source_dir.join(&file.name);
            if !source.is_file() {
                summary
                    .notes
                    .push(format!("File {} missing from bundle", file.name));
                continue;
            }

            let plain = match self.to_plaintext(&source, file.encrypted).await {
                Ok(path) => path,
                Err(e) => {
                    warn!(name = %file.name, error = %e, "payload left unprocessed");
                    summary
                        .notes
                        .push(format!("Could not process {}: {}", file.name, e));
                    continue;
                }
            };

            if let Some(name) = plain.file_name().and_then(|n| n.to_str()) {
                if is_form_file(name) {
                    self.read_form_fields(&plain, &mut summary).await;
                }
            }

            let dest = dest_dir.join(plain.file_name().unwrap_or_default());
            move_file(&plain, &dest).await?;
            summary.deliverables.push(dest);
        }

        let transcript = summary.render();
        tokio::fs::write(dest_dir.join(INFO_FILE), transcript).await?;

        info!(
            id = %message.id,
            deliverables = summary.deliverables.len(),
            notes = summary.notes.len(),
            "message extracted"
        );
        Ok(summary)
    }

    /// Strip encryption and signature containers, deleting each consumed
    /// intermediate so only the plaintext survives.
    async fn to_plaintext(&self, path: &Path, encrypted: bool) -> Result<PathBuf> {
        let mut current = path.to_path_buf();

        if encrypted || has_suffix(&current, ".enc") {
            let plain = self.crypto.decrypt(&current).await?;
            tokio::fs::remove_file(&current).await?;
            current = plain;
        }
        if has_suffix(&current, ".sig") {
            let plain = self.crypto.clean_sign(&current).await?;
            tokio::fs::remove_file(&current).await?;
            current = plain;
        }
        Ok(current)
    }

    async fn read_form_fields(&self, path: &Path, summary: &mut MessageInfo) {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => {
                debug!(?path, error = %e, "form file unreadable, skipping summary");
                return;
            }
        };
        let capture = |pattern: &Regex| {
            pattern
                .captures(&content)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
        };
        if summary.subject.is_none() {
            summary.subject = capture(&self.form_fields.subject);
        }
        if summary.counterpart.is_none() {
            summary.counterpart = capture(&self.form_fields.counterpart);
        }
        if summary.document_date.is_none() {
            summary.document_date = capture(&self.form_fields.document_date);
        }
    }
}

fn is_form_file(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower == "form.xml" || lower == "passport.xml"
}

fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.len() > suffix.len() && n.ends_with(suffix))
}

/// Rename with a copy-and-delete fallback for cross-device moves.
async fn move_file(source: &Path, dest: &Path) -> Result<()> {
    if tokio::fs::rename(source, dest).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(source, dest).await.map_err(|e| {
        Error::Extraction(ExtractionError::MoveFailed {
            source_path: source.to_path_buf(),
            dest_path: dest.to_path_buf(),
            reason: e.to_string(),
        })
    })?;
    tokio::fs::remove_file(source).await?;
    Ok(())
}
