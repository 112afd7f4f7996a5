//! Bulk writer configuration
//!
//! # Defaults
//!
//! - flush every 2s, unbounded buffer, 400 retries per record
//! - health check: yellow or better, at least 1 node, 30s server-side wait
//! - startup: check once per second until the cluster answers
//! - reconnect: 3 checks, 1s then 3s apart

use std::time::Duration;

use serde::Deserialize;

/// Cluster status names accepted in `min_status`
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClusterStatus {
    Green,
    #[default]
    Yellow,
    Red,
}

/// `wait_for_active_shards`: a count or `"all"`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ActiveShardsSetting {
    Count(u32),
    Named(String),
}

impl Default for ActiveShardsSetting {
    fn default() -> Self {
        Self::Count(1)
    }
}

/// `[writer.health_check]`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// How long the cluster may wait for the criteria
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub min_nodes: u32,
    pub min_status: ClusterStatus,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            min_nodes: 1,
            min_status: ClusterStatus::Yellow,
        }
    }
}

/// `[writer.startup_backoff]`: checks until the cluster answers
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct StartupBackoffConfig {
    /// Growth factor between delays
    pub factor: f64,

    #[serde(with = "humantime_serde")]
    pub min_delay: Duration,

    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
}

impl Default for StartupBackoffConfig {
    fn default() -> Self {
        Self {
            factor: 1.0,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

/// `[writer.reconnect_backoff]`: gives up after `max_attempts` checks
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReconnectBackoffConfig {
    /// Total checks before giving up
    pub max_attempts: u32,

    pub factor: f64,

    #[serde(with = "humantime_serde")]
    pub min_delay: Duration,

    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
}

impl Default for ReconnectBackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            factor: 3.0,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

/// `[writer]` section
///
/// ```toml
/// [writer]
/// interval = "2s"
/// buffer_limit = 10000
/// retry_limit = 400
/// pipeline = "geoip"
/// wait_for_active_shards = "all"
///
/// [writer.reconnect_backoff]
/// max_attempts = 5
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct WriterSection {
    /// Time between scheduled flushes
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Maximum buffered records (absent = unbounded)
    pub buffer_limit: Option<usize>,

    /// Failed flushes a record may survive
    pub retry_limit: u32,

    /// Buffer and flush on a timer; when off every record is sent on its own
    pub buffering: bool,

    /// Ingest pipeline
    pub pipeline: Option<String>,

    pub wait_for_active_shards: ActiveShardsSetting,

    pub health_check: HealthCheckConfig,

    pub startup_backoff: StartupBackoffConfig,

    pub reconnect_backoff: ReconnectBackoffConfig,
}

impl Default for WriterSection {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            buffer_limit: None,
            retry_limit: 400,
            buffering: true,
            pipeline: None,
            wait_for_active_shards: ActiveShardsSetting::default(),
            health_check: HealthCheckConfig::default(),
            startup_backoff: StartupBackoffConfig::default(),
            reconnect_backoff: ReconnectBackoffConfig::default(),
        }
    }
}
