//! # portal-sync
//!
//! Client library for synchronizing a regulatory message portal into a
//! local, idempotent on-disk archive.
//!
//! ## Design Philosophy
//!
//! portal-sync is designed to be:
//! - **Resilient** - Every portal call retries transient failures with
//!   backoff under a wall-clock deadline
//! - **Idempotent** - The filesystem is the ledger; re-running a sync
//!   costs no network traffic for already-settled messages
//! - **Degradable** - A missing crypto agent or an unreadable payload
//!   becomes a note in the transcript, not a crash
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//!
//! ## Quick Start
//!
//! ```no_run
//! use portal_sync::{Config, MessagesFilter, MessagePipeline, PortalClient, SmtpNotifier};
//! use portal_sync::crypto::provider_from_config;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         portal: portal_sync::config::PortalConfig {
//!             base_url: "https://portal.example.com/api/v1/".to_string(),
//!             api_token: Some("token".to_string()),
//!         },
//!         ..Default::default()
//!     };
//!
//!     let client = PortalClient::new(&config)?;
//!     let crypto = provider_from_config(config.crypto_agent_path.as_ref());
//!     let notifier = Arc::new(SmtpNotifier::new(config.notify.clone())?);
//!     let pipeline = MessagePipeline::new(&config, client, crypto, notifier);
//!
//!     // Archive everything from the last week.
//!     let filter = MessagesFilter {
//!         days: Some(7),
//!         ..Default::default()
//!     };
//!     let report = pipeline.process_filtered(&filter).await?;
//!     println!("{}", report.render());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// On-disk archive layout and idempotency ledger
pub mod archive;
/// Portal REST client
pub mod client;
/// Configuration types
pub mod config;
/// Cryptographic agent integration
pub mod crypto;
/// Error types
pub mod error;
/// Listing filters and their canonical query encoding
pub mod filter;
/// SMTP outcome notifications
pub mod notify;
/// Paginated listing traversal
pub mod pages;
/// Message processing pipeline
pub mod pipeline;
/// Registration status polling
pub mod poller;
/// Resilient HTTP transport
pub mod transport;
/// Core data model
pub mod types;

// Re-export commonly used types
pub use archive::{Archive, ArchiveEntry};
pub use client::PortalClient;
pub use config::{Config, NotifyMode};
pub use crypto::{CliCryptoProvider, CryptoProvider, NoOpCryptoProvider};
pub use error::{ApiErrorBody, Error, ExtractionError, Result};
pub use filter::MessagesFilter;
pub use notify::{MockNotifier, Notifier, SmtpNotifier};
pub use pages::PageWalker;
pub use pipeline::{Extractor, MessagePipeline, ProcessOutcome};
pub use poller::StatusPoller;
pub use transport::ResilientTransport;
pub use types::{
    Direction, Message, MessageFile, MessageId, MessageInfo, MessageReceipt, MessageStatus,
    Pagination, SyncReport,
};
