//! No-op crypto provider for graceful degradation

use super::traits::{CryptoCapabilities, CryptoProvider};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Crypto provider used when no agent binary is available
///
/// Every operation reports `Error::NotSupported`. The extraction pipeline
/// turns that into a per-file note and keeps the ciphertext in place, so a
/// run without the agent still archives everything it can.
pub struct NoOpCryptoProvider;

fn not_supported(operation: &str) -> crate::Error {
    crate::Error::NotSupported(format!(
        "{operation} requires the external crypto agent. \
         Configure crypto_agent_path or ensure crypto-agent is in PATH."
    ))
}

#[async_trait]
impl CryptoProvider for NoOpCryptoProvider {
    async fn decrypt(&self, _path: &Path) -> crate::Result<PathBuf> {
        Err(not_supported("decryption"))
    }

    async fn clean_sign(&self, _path: &Path) -> crate::Result<PathBuf> {
        Err(not_supported("signature cleaning"))
    }

    async fn sign(&self, _path: &Path) -> crate::Result<PathBuf> {
        Err(not_supported("signing"))
    }

    async fn encrypt(&self, _path: &Path, _recipients: &[String]) -> crate::Result<PathBuf> {
        Err(not_supported("encryption"))
    }

    async fn verify(&self, _content: &Path, _signature: &Path) -> crate::Result<bool> {
        Err(not_supported("signature verification"))
    }

    fn capabilities(&self) -> CryptoCapabilities {
        CryptoCapabilities {
            can_decrypt: false,
            can_sign: false,
        }
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
