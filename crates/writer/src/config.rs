//! Bulk writer configuration

use std::time::Duration;

use crate::backoff::BackoffPolicy;
use crate::client::{ActiveShards, HealthCheck, TemplateKind};
use crate::events::DEFAULT_EVENT_CAPACITY;
use crate::scheduler::DEFAULT_FLUSH_INTERVAL;
use crate::template::{TemplateBootstrapper, TemplateSpec};

/// Default number of failed dispatches a record may survive
pub const DEFAULT_RETRY_LIMIT: u32 = 400;

/// Default shard copies required before a write proceeds
pub const DEFAULT_WAIT_FOR_ACTIVE_SHARDS: ActiveShards = ActiveShards::Count(1);

/// Template to ensure after each successful connection
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateConfig {
    pub kind: TemplateKind,
    pub spec: TemplateSpec,
}

impl TemplateConfig {
    pub fn new(kind: TemplateKind, spec: TemplateSpec) -> Self {
        Self { kind, spec }
    }

    /// Legacy template `template_<prefix>` matching `<prefix>-*`
    pub fn for_prefix(prefix: &str) -> Self {
        Self::new(TemplateKind::Legacy, TemplateSpec::for_prefix(prefix))
    }

    pub(crate) fn bootstrapper(&self) -> TemplateBootstrapper {
        TemplateBootstrapper::new(self.kind, self.spec.clone())
    }
}

/// Bulk writer configuration
#[derive(Debug, Clone, PartialEq)]
pub struct WriterConfig {
    /// Time between scheduled flushes
    pub interval: Duration,

    /// Maximum buffered records (`None` = unbounded)
    pub buffer_limit: Option<usize>,

    /// Failed dispatches a record may survive before it is dropped
    pub retry_limit: u32,

    /// Buffer records and flush on a timer; when off, each append is sent
    /// on its own with no retry
    pub buffering: bool,

    /// Ingest pipeline for every bulk request
    pub pipeline: Option<String>,

    pub wait_for_active_shards: Option<ActiveShards>,

    /// Server-side bulk timeout (defaults to `interval`)
    pub request_timeout: Option<Duration>,

    pub health_check: HealthCheck,

    /// Profile for the first connection
    pub startup_backoff: BackoffPolicy,

    /// Profile for reconnecting after a failed flush
    pub reconnect_backoff: BackoffPolicy,

    /// Template bootstrap (`None` = disabled)
    pub template: Option<TemplateConfig>,

    /// Capacity of the event channel
    pub event_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_FLUSH_INTERVAL,
            buffer_limit: None,
            retry_limit: DEFAULT_RETRY_LIMIT,
            buffering: true,
            pipeline: None,
            wait_for_active_shards: Some(DEFAULT_WAIT_FOR_ACTIVE_SHARDS),
            request_timeout: None,
            health_check: HealthCheck::default(),
            startup_backoff: BackoffPolicy::startup(),
            reconnect_backoff: BackoffPolicy::reconnect(),
            template: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl WriterConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_buffer_limit(mut self, limit: usize) -> Self {
        self.buffer_limit = Some(limit);
        self
    }

    pub fn with_retry_limit(mut self, limit: u32) -> Self {
        self.retry_limit = limit;
        self
    }

    pub fn with_buffering(mut self, buffering: bool) -> Self {
        self.buffering = buffering;
        self
    }

    pub fn with_pipeline(mut self, pipeline: impl Into<String>) -> Self {
        self.pipeline = Some(pipeline.into());
        self
    }

    pub fn with_wait_for_active_shards(mut self, shards: Option<ActiveShards>) -> Self {
        self.wait_for_active_shards = shards;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_health_check(mut self, check: HealthCheck) -> Self {
        self.health_check = check;
        self
    }

    pub fn with_startup_backoff(mut self, policy: BackoffPolicy) -> Self {
        self.startup_backoff = policy;
        self
    }

    pub fn with_reconnect_backoff(mut self, policy: BackoffPolicy) -> Self {
        self.reconnect_backoff = policy;
        self
    }

    pub fn with_template(mut self, template: TemplateConfig) -> Self {
        self.template = Some(template);
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Timeout sent with each bulk request
    pub fn bulk_timeout(&self) -> Duration {
        self.request_timeout.unwrap_or(self.interval)
    }
}
