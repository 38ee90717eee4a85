//! Trait and types for cryptographic agent integration

use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Capabilities of a crypto provider implementation
#[derive(Debug, Clone, Copy)]
pub struct CryptoCapabilities {
    /// Can decrypt `.enc` payloads
    pub can_decrypt: bool,
    /// Can strip and apply signatures
    pub can_sign: bool,
}

/// Interface to the external cryptographic agent
///
/// All path-returning operations work in place next to the input file and
/// return the path of the produced artefact. Suffix conventions:
/// decryption strips a trailing `.enc`, signature cleaning strips a
/// trailing `.sig`, and the inverse operations append those suffixes.
#[async_trait]
pub trait CryptoProvider: Send + Sync {
    /// Decrypt `path` in place, producing the file without its `.enc`
    /// suffix.
    ///
    /// # Errors
    ///
    /// `Error::Crypto` when the agent rejects the file,
    /// `Error::NotSupported` for stub implementations.
    async fn decrypt(&self, path: &Path) -> crate::Result<PathBuf>;

    /// Remove the enveloping signature container from `path`, producing
    /// the payload without its `.sig` suffix.
    ///
    /// # Errors
    ///
    /// Same contract as [`decrypt`](Self::decrypt).
    async fn clean_sign(&self, path: &Path) -> crate::Result<PathBuf>;

    /// Sign `path`, producing `path.sig`.
    async fn sign(&self, path: &Path) -> crate::Result<PathBuf>;

    /// Encrypt `path` for the given recipient certificates, producing
    /// `path.enc`.
    async fn encrypt(&self, path: &Path, recipients: &[String]) -> crate::Result<PathBuf>;

    /// Verify the detached signature at `signature` over `content`.
    ///
    /// Returns `true` when the signature is valid, `false` when it is
    /// well-formed but does not verify.
    async fn verify(&self, content: &Path, signature: &Path) -> crate::Result<bool>;

    /// Query capabilities of this provider
    fn capabilities(&self) -> CryptoCapabilities;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Strip a single trailing suffix such as `.enc` or `.sig` from a path.
///
/// Returns `None` when the path does not end in the suffix.
pub(crate) fn strip_suffix(path: &Path, suffix: &str) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let stripped = name.strip_suffix(suffix)?;
    if stripped.is_empty() {
        return None;
    }
    Some(path.with_file_name(stripped))
}

/// Append a suffix such as `.sig` to a path's file name.
pub(crate) fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}
