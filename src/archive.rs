//! On-disk archive layout and idempotency ledger
//!
//! The archive is the source of truth for what has already been processed.
//! Each message owns three possible artefacts under
//! `{root}/{direction}/{task}/{yyyy-MM}/`:
//!
//! * `{yyyy-MM-dd}-{id}.json` - the message manifest
//! * `{yyyy-MM-dd}-{id}.zip`  - the downloaded bundle
//! * `{yyyy-MM-dd}-{id}.zip.err` - tombstone marking a permanently failed
//!   bundle, so later runs stop re-downloading it
//!
//! Extracted documents land separately under
//! `{doc_root}/{direction}/{yyyy-MM}/{stem}/`.

use crate::error::{Error, Result};
use crate::types::Message;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Archive paths for one message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Manifest path (`.json`)
    pub manifest: PathBuf,
    /// Bundle path (`.zip`)
    pub bundle: PathBuf,
    /// Tombstone path (`.zip.err`)
    pub tombstone: PathBuf,
    /// Extraction destination directory
    pub dest_dir: PathBuf,
}

/// Message archive rooted at a pair of directories.
#[derive(Clone, Debug)]
pub struct Archive {
    root: PathBuf,
    doc_root: PathBuf,
}

impl Archive {
    /// Create an archive over the given roots. Directories are created
    /// lazily on first write.
    pub fn new(root: impl Into<PathBuf>, doc_root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            doc_root: doc_root.into(),
        }
    }

    /// Archive root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Compute every artefact path for `message`.
    ///
    /// Task names appear verbatim in the path; the portal restricts them to
    /// filesystem-safe identifiers.
    pub fn entry(&self, message: &Message) -> ArchiveEntry {
        self.entry_at(message, message.creation_date)
    }

    fn entry_at(&self, message: &Message, created: DateTime<Utc>) -> ArchiveEntry {
        let label = message.direction.label();
        let month = created.format("%Y-%m").to_string();
        let stem = format!("{}-{}", created.format("%Y-%m-%d"), message.id);
        let task = if message.task_name.is_empty() {
            "unknown"
        } else {
            message.task_name.as_str()
        };

        let dir = self.root.join(label).join(task).join(&month);
        ArchiveEntry {
            manifest: dir.join(format!("{stem}.json")),
            bundle: dir.join(format!("{stem}.zip")),
            tombstone: dir.join(format!("{stem}.zip.err")),
            dest_dir: self.doc_root.join(label).join(&month).join(&stem),
        }
    }

    /// Whether the manifest has been written.
    pub fn has_manifest(&self, entry: &ArchiveEntry) -> bool {
        entry.manifest.is_file()
    }

    /// Whether the bundle has been downloaded.
    pub fn has_bundle(&self, entry: &ArchiveEntry) -> bool {
        entry.bundle.is_file()
    }

    /// Whether a tombstone marks the bundle as permanently failed.
    pub fn has_tombstone(&self, entry: &ArchiveEntry) -> bool {
        entry.tombstone.is_file()
    }

    /// Persist the message manifest as pretty JSON.
    pub async fn write_manifest(&self, entry: &ArchiveEntry, message: &Message) -> Result<()> {
        let json = serde_json::to_string_pretty(message)?;
        write_atomic(&entry.manifest, json.as_bytes()).await
    }

    /// Persist the bundle bytes.
    pub async fn write_bundle(&self, entry: &ArchiveEntry, bytes: &[u8]) -> Result<()> {
        write_atomic(&entry.bundle, bytes).await
    }

    /// Drop a tombstone recording why the bundle is unobtainable.
    pub async fn write_tombstone(&self, entry: &ArchiveEntry, reason: &str) -> Result<()> {
        let note = format!("{}\n{}\n", Utc::now().format("%Y-%m-%dT%H:%M:%SZ"), reason);
        write_atomic(&entry.tombstone, note.as_bytes()).await
    }
}

/// Write via a sibling temp file then rename, so a crash never leaves a
/// half-written artefact that a later run would treat as complete.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| Error::Config {
        message: format!("archive path has no parent: {}", path.display()),
        key: None,
    })?;
    tokio::fs::create_dir_all(parent).await?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
