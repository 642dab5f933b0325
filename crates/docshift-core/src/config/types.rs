use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::app::{ExecutionStrategy, TimeLimits, UnknownJobPolicy};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub converter: ConverterConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub inbox: InboxConfig,
}

/// Object store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Directory holding all objects.
    #[serde(default = "default_store_root")]
    pub root: PathBuf,
    /// Base of signed result URLs; the object key is appended.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Shared secret for URL signatures. Must be set.
    #[serde(default)]
    pub signing_secret: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_store_root(),
            public_base_url: default_public_base_url(),
            signing_secret: String::new(),
        }
    }
}

fn default_store_root() -> PathBuf {
    PathBuf::from("./data/objects")
}

fn default_public_base_url() -> String {
    "http://localhost:8000/files".to_string()
}

/// Conversion service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConverterConfig {
    #[serde(default = "default_converter_host")]
    pub host: String,
    #[serde(default = "default_converter_port")]
    pub port: u16,
    /// Target format sent as `convert-to`.
    #[serde(default = "default_convert_to")]
    pub convert_to: String,
    /// Accepted upload extension, without the dot.
    #[serde(default = "default_input_extension")]
    pub input_extension: String,
    #[serde(default = "default_converter_timeout")]
    pub timeout_secs: u64,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            host: default_converter_host(),
            port: default_converter_port(),
            convert_to: default_convert_to(),
            input_extension: default_input_extension(),
            timeout_secs: default_converter_timeout(),
        }
    }
}

fn default_converter_host() -> String {
    "unoserver".to_string()
}

fn default_converter_port() -> u16 {
    2004
}

fn default_convert_to() -> String {
    "pdf".to_string()
}

fn default_input_extension() -> String {
    "pptx".to_string()
}

fn default_converter_timeout() -> u64 {
    300
}

/// Worker tier configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_soft_time_limit")]
    pub soft_time_limit_secs: u64,
    #[serde(default = "default_time_limit")]
    pub time_limit_secs: u64,
    #[serde(default)]
    pub strategy: ExecutionStrategy,
    /// Lifetime of signed result URLs.
    #[serde(default = "default_url_ttl")]
    pub url_ttl_secs: u64,
}

impl WorkerConfig {
    pub fn limits(&self) -> TimeLimits {
        TimeLimits::new(
            Duration::from_secs(self.soft_time_limit_secs),
            Duration::from_secs(self.time_limit_secs),
        )
    }

    pub fn url_ttl(&self) -> Duration {
        Duration::from_secs(self.url_ttl_secs)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            soft_time_limit_secs: default_soft_time_limit(),
            time_limit_secs: default_time_limit(),
            strategy: ExecutionStrategy::default(),
            url_ttl_secs: default_url_ttl(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_soft_time_limit() -> u64 {
    300
}

fn default_time_limit() -> u64 {
    360
}

fn default_url_ttl() -> u64 {
    3600
}

/// Retention sweeper configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    #[serde(default = "default_window_hours")]
    pub window_hours: u64,
    #[serde(default = "default_sweep_interval_hours")]
    pub sweep_interval_hours: u64,
}

/// Upper bound for the retention hour settings (about a century).
pub const MAX_RETENTION_HOURS: u64 = 876_000;

impl RetentionConfig {
    pub fn window(&self) -> Duration {
        hours(self.window_hours)
    }

    pub fn sweep_interval(&self) -> Duration {
        hours(self.sweep_interval_hours)
    }
}

fn hours(n: u64) -> Duration {
    Duration::from_secs(n.saturating_mul(3600))
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            window_hours: default_window_hours(),
            sweep_interval_hours: default_sweep_interval_hours(),
        }
    }
}

fn default_window_hours() -> u64 {
    24
}

fn default_sweep_interval_hours() -> u64 {
    6
}

/// Status resolution configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StatusConfig {
    #[serde(default)]
    pub unknown_job_policy: UnknownJobPolicy,
}

/// Inbox directory watched by `docshift serve`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InboxConfig {
    /// Directory to watch. `serve` runs without workers when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_inbox_poll_interval")]
    pub poll_interval_secs: u64,
    /// How long a file's size must stay unchanged before it is submitted.
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
}

impl InboxConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            dir: None,
            poll_interval_secs: default_inbox_poll_interval(),
            settle_secs: default_settle_secs(),
        }
    }
}

fn default_inbox_poll_interval() -> u64 {
    2
}

fn default_settle_secs() -> u64 {
    2
}
