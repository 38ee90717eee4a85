//! CLI-based crypto provider using the external agent binary

use super::traits::{append_suffix, strip_suffix, CryptoCapabilities, CryptoProvider};
use crate::error::Error;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Name the agent binary is published under.
const AGENT_BINARY: &str = "crypto-agent";

/// Crypto provider that shells out to the organisation's key agent
///
/// The agent speaks a fixed subcommand protocol:
/// `crypto-agent <decrypt|unsign|sign|encrypt|verify> <input> <output>`
/// (encryption adds one `--for <recipient>` pair per recipient), exiting
/// non-zero with a diagnostic on stderr when the operation fails.
pub struct CliCryptoProvider {
    binary_path: PathBuf,
}

impl CliCryptoProvider {
    /// Create a provider with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find the agent binary in PATH
    ///
    /// # Returns
    ///
    /// `Some(CliCryptoProvider)` if the binary is found, `None` otherwise.
    pub fn from_path() -> Option<Self> {
        which::which(AGENT_BINARY).ok().map(Self::new)
    }

    async fn run(&self, verb: &str, input: &Path, output: &Path) -> crate::Result<()> {
        let result = Command::new(&self.binary_path)
            .arg(verb)
            .arg(input)
            .arg(output)
            .output()
            .await
            .map_err(|e| Error::Crypto {
                path: input.to_path_buf(),
                reason: format!("failed to execute {}: {}", AGENT_BINARY, e),
            })?;

        if !result.status.success() {
            return Err(Error::Crypto {
                path: input.to_path_buf(),
                reason: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CryptoProvider for CliCryptoProvider {
    async fn decrypt(&self, path: &Path) -> crate::Result<PathBuf> {
        let output = strip_suffix(path, ".enc").ok_or_else(|| Error::Crypto {
            path: path.to_path_buf(),
            reason: "encrypted payload must carry the .enc suffix".to_string(),
        })?;
        self.run("decrypt", path, &output).await?;
        Ok(output)
    }

    async fn clean_sign(&self, path: &Path) -> crate::Result<PathBuf> {
        let output = strip_suffix(path, ".sig").ok_or_else(|| Error::Crypto {
            path: path.to_path_buf(),
            reason: "signature container must carry the .sig suffix".to_string(),
        })?;
        self.run("unsign", path, &output).await?;
        Ok(output)
    }

    async fn sign(&self, path: &Path) -> crate::Result<PathBuf> {
        let output = append_suffix(path, ".sig");
        self.run("sign", path, &output).await?;
        Ok(output)
    }

    async fn encrypt(&self, path: &Path, recipients: &[String]) -> crate::Result<PathBuf> {
        let output = append_suffix(path, ".enc");
        let mut command = Command::new(&self.binary_path);
        command.arg("encrypt").arg(path).arg(&output);
        for recipient in recipients {
            command.arg("--for").arg(recipient);
        }
        let result = command.output().await.map_err(|e| Error::Crypto {
            path: path.to_path_buf(),
            reason: format!("failed to execute {}: {}", AGENT_BINARY, e),
        })?;
        if !result.status.success() {
            return Err(Error::Crypto {
                path: path.to_path_buf(),
                reason: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }

    async fn verify(&self, content: &Path, signature: &Path) -> crate::Result<bool> {
        let result = Command::new(&self.binary_path)
            .arg("verify")
            .arg(content)
            .arg(signature)
            .output()
            .await
            .map_err(|e| Error::Crypto {
                path: content.to_path_buf(),
                reason: format!("failed to execute {}: {}", AGENT_BINARY, e),
            })?;
        Ok(result.status.success())
    }

    fn capabilities(&self) -> CryptoCapabilities {
        CryptoCapabilities {
            can_decrypt: true,
            can_sign: true,
        }
    }

    fn name(&self) -> &'static str {
        "cli-agent"
    }
}
