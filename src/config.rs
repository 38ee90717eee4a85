//! Configuration types for portal-sync

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Portal endpoint configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Base URL of the portal API (e.g., "https://portal.example.com/api/v1/")
    pub base_url: String,

    /// Bearer token for the portal (None = unauthenticated)
    #[serde(default)]
    pub api_token: Option<String>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/v1/".to_string(),
            api_token: None,
        }
    }
}

/// Transport resilience configuration (cool-down, backoff, deadline)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Minimum spacing between consecutive requests (default: 1 second)
    #[serde(default = "default_cooldown", with = "duration_serde")]
    pub cooldown: Duration,

    /// Base backoff delay; attempt N waits N x base (default: 2 seconds)
    #[serde(default = "default_base_delay", with = "duration_serde")]
    pub base_delay: Duration,

    /// Wall-clock deadline for one logical call including retries (default: 10 minutes)
    #[serde(default = "default_deadline", with = "duration_serde")]
    pub deadline: Duration,

    /// Per-attempt HTTP timeout (default: 60 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            cooldown: default_cooldown(),
            base_delay: default_base_delay(),
            deadline: default_deadline(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Archive layout configuration (roots, exclusions)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Root for manifests, bundles, and tombstones (default: "./archive")
    #[serde(default = "default_archive_root")]
    pub archive_root: PathBuf,

    /// Root for extracted plaintext deliverables (default: "./documents")
    #[serde(default = "default_doc_root")]
    pub doc_root: PathBuf,

    /// Scratch directory for in-flight downloads (default: "./work")
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Task names to skip during batch processing
    #[serde(default)]
    pub excluded_tasks: Vec<String>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            archive_root: default_archive_root(),
            doc_root: default_doc_root(),
            work_dir: default_work_dir(),
            excluded_tasks: Vec::new(),
        }
    }
}

/// Status polling configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollConfig {
    /// Interval between status fetches (default: 30 seconds)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Overall time budget for one wait (default: 30 minutes)
    #[serde(default = "default_poll_deadline", with = "duration_serde")]
    pub poll_deadline: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            poll_deadline: default_poll_deadline(),
        }
    }
}

/// When notifications are dispatched during batch processing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyMode {
    /// One notification per processed message
    Immediate,
    /// A single digest notification per batch (default)
    #[default]
    Digest,
}

/// Notification configuration (SMTP relay and recipients)
///
/// Used as a nested sub-config within [`Config`]. Leaving `recipients`
/// empty disables notifications entirely.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Dispatch mode
    #[serde(default)]
    pub mode: NotifyMode,

    /// SMTP relay hostname (None = notifications disabled)
    #[serde(default)]
    pub smtp_host: Option<String>,

    /// SMTP relay port (default: 587)
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// SMTP username
    #[serde(default)]
    pub smtp_user: Option<String>,

    /// SMTP password
    #[serde(default)]
    pub smtp_password: Option<String>,

    /// From address
    #[serde(default)]
    pub from: Option<String>,

    /// Recipient addresses
    #[serde(default)]
    pub recipients: Vec<String>,
}

/// Main configuration for the synchronization pipeline
///
/// Fields are organized into logical sub-configs for maintainability:
/// - [`portal`](PortalConfig) — endpoint and credentials
/// - [`transport`](TransportConfig) — cool-down, backoff, deadlines
/// - [`archive`](ArchiveConfig) — on-disk layout and exclusions
/// - [`poll`](PollConfig) — status polling cadence
/// - [`notify`](NotifyConfig) — SMTP notifications
///
/// All sub-config fields are flattened for backward-compatible serialization,
/// meaning the JSON/TOML format remains unchanged (no nesting).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Portal endpoint and credentials
    #[serde(flatten)]
    pub portal: PortalConfig,

    /// Transport resilience settings
    #[serde(flatten)]
    pub transport: TransportConfig,

    /// Archive layout settings
    #[serde(flatten)]
    pub archive: ArchiveConfig,

    /// Status polling settings
    #[serde(flatten)]
    pub poll: PollConfig,

    /// Notification settings
    #[serde(flatten)]
    pub notify: NotifyConfig,

    /// Path to the external crypto agent binary (auto-detected if None)
    #[serde(default)]
    pub crypto_agent_path: Option<PathBuf>,
}

// Convenience accessors so call sites can use `config.archive_root()`
// without reaching through the sub-config structs.
impl Config {
    /// Archive root directory
    pub fn archive_root(&self) -> &PathBuf {
        &self.archive.archive_root
    }

    /// Deliverable (document) root directory
    pub fn doc_root(&self) -> &PathBuf {
        &self.archive.doc_root
    }
}

fn default_cooldown() -> Duration {
    Duration::from_secs(1)
}

fn default_base_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_deadline() -> Duration {
    Duration::from_secs(600)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_archive_root() -> PathBuf {
    PathBuf::from("./archive")
}

fn default_doc_root() -> PathBuf {
    PathBuf::from("./documents")
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("./work")
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_poll_deadline() -> Duration {
    Duration::from_secs(1800)
}

fn default_smtp_port() -> u16 {
    587
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
