//! Cryptographic agent integration
//!
//! Regulatory payloads arrive encrypted (`.enc`) and signed (`.sig`); the
//! actual cryptography lives in an external agent binary holding the
//! organisation's keys. This module wraps that binary behind the
//! [`CryptoProvider`] trait:
//!
//! - [`CliCryptoProvider`]: shells out to the configured agent binary
//! - [`NoOpCryptoProvider`]: stub when no agent is available, every
//!   operation reports `Error::NotSupported` so encrypted messages degrade
//!   to a note instead of a crash
//!
//! ## Usage
//!
//! ```no_run
//! use portal_sync::crypto::{CliCryptoProvider, CryptoProvider};
//! use std::path::Path;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = CliCryptoProvider::from_path()
//!     .expect("crypto agent not found in PATH");
//!
//! let plain = provider.decrypt(Path::new("report.xml.enc")).await?;
//! assert_eq!(plain, Path::new("report.xml"));
//! # Ok(())
//! # }
//! ```

mod cli;
mod noop;
mod traits;

pub use cli::CliCryptoProvider;
pub use noop::NoOpCryptoProvider;
pub use traits::{CryptoCapabilities, CryptoProvider};

use std::path::PathBuf;
use std::sync::Arc;

/// Pick a provider: the configured binary first, then PATH discovery, then
/// the no-op stub.
pub fn provider_from_config(agent_path: Option<&PathBuf>) -> Arc<dyn CryptoProvider> {
    if let Some(path) = agent_path {
        return Arc::new(CliCryptoProvider::new(path.clone()));
    }
    match CliCryptoProvider::from_path() {
        Some(provider) => Arc::new(provider),
        None => {
            tracing::warn!("no crypto agent found, encrypted payloads will be skipped");
            Arc::new(NoOpCryptoProvider)
        }
    }
}
