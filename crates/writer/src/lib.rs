//! Buffered bulk writer for document sinks
//!
//! Records are appended to a capacity-bounded buffer and flushed on a timer as
//! one bulk request. Failed requests are rolled back into the buffer and
//! retried after the sink passes a health check again; records that keep
//! failing are dropped once they exceed the retry limit.
//!
//! # Example
//!
//! ```ignore
//! let (writer, task) = BulkWriter::new(client, WriterConfig::default());
//! tokio::spawn(task.run());
//! writer.start()?;
//!
//! writer.append("logs-2024.01.01", json!({"message": "hello"}))?;
//!
//! let metrics = writer.shutdown().await?;
//! ```
//!
//! # Components
//!
//! - [`Buffer`]: ordered record store with swap-out and rollback
//! - [`Scheduler`]: single flush timer that pauses while idle
//! - [`ConnectionController`]: health check with [`BackoffPolicy`]
//! - [`TemplateBootstrapper`]: create-if-absent template after each connect
//! - [`BulkWriter`] / [`WriterTask`]: handle and worker tying them together
//!
//! The sink itself is abstracted behind [`SinkClient`].

pub mod backoff;
pub mod buffer;
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod metrics;
pub mod scheduler;
pub mod template;
pub mod writer;

#[cfg(test)]
mod mock;

pub use backoff::{BackoffPolicy, RetryAttempt};
pub use buffer::{Buffer, BufferedRecord, RollbackOutcome};
pub use client::{
    ActiveShards, BulkItem, BulkOperation, BulkRequest, BulkResponse, HealthCheck, HealthStatus,
    ItemError, SinkClient, TemplateKind,
};
pub use config::{TemplateConfig, WriterConfig};
pub use controller::{ConnectionController, ConnectionState};
pub use error::{Severity, SinkClientError, WriterError};
pub use events::{EventEmitter, WriterEvent};
pub use metrics::{MetricsSnapshot, WriterMetrics, WriterMetricsHandle};
pub use scheduler::{ScheduleState, Scheduler};
pub use template::{TemplateBootstrapper, TemplateOutcome, TemplateSpec};
pub use writer::{BulkWriter, FlushReport, WriterTask};
