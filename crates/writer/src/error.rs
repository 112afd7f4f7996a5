//! Writer and sink client errors

use std::time::Duration;

use thiserror::Error;

/// How an error affects the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The writer keeps operating on its own; reported as a warning
    Recoverable,
    /// Data was lost or the writer gave up; reported as an error
    Fatal,
}

/// Errors surfaced by the bulk writer
///
/// Every variant carries owned data so it can be broadcast to any number of
/// event subscribers.
#[derive(Debug, Clone, Error)]
pub enum WriterError {
    /// The sink was unreachable or rejected the whole bulk request
    #[error("bulk request failed ({records} records): {message}")]
    Transient { records: usize, message: String },

    /// The sink rejected a single record of an otherwise successful request
    #[error("record rejected by {destination} (status {status}): {kind}: {reason}")]
    ItemRejected {
        destination: String,
        status: u16,
        kind: String,
        reason: String,
    },

    /// The buffer was full and the record was dropped
    #[error("buffer full ({limit} records), dropped record for {destination}")]
    CapacityExceeded { destination: String, limit: usize },

    /// Checking or creating the template failed
    #[error("template '{name}' bootstrap failed: {message}")]
    TemplateBootstrap { name: String, message: String },

    /// A record failed too many times and was dropped for good
    #[error("record for {destination} dropped after {attempts} failed attempts")]
    RetryExhausted { destination: String, attempts: u32 },

    /// The bounded reconnect profile ran out of attempts
    #[error("sink still unreachable after {attempts} attempts: {last_error}")]
    ReconnectExhausted { attempts: u32, last_error: String },

    /// The writer task has exited
    #[error("writer is closed")]
    Closed,
}

impl WriterError {
    /// Classify this error for event routing
    pub fn severity(&self) -> Severity {
        match self {
            Self::RetryExhausted { .. } | Self::ReconnectExhausted { .. } => Severity::Fatal,
            _ => Severity::Recoverable,
        }
    }

    /// Whether this error is a hard, unrecoverable signal
    #[inline]
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

/// Errors returned by a [`SinkClient`](crate::SinkClient) implementation
#[derive(Debug, Clone, Error)]
pub enum SinkClientError {
    /// Could not reach the sink at all
    #[error("transport error: {0}")]
    Transport(String),

    /// The sink answered with an unexpected status
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The request did not complete in time
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The response body could not be decoded
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The sink is reachable but does not meet the health criteria
    #[error("sink unhealthy: {0}")]
    Unhealthy(String),
}

impl SinkClientError {
    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a status error
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Create an unhealthy error
    pub fn unhealthy(msg: impl Into<String>) -> Self {
        Self::Unhealthy(msg.into())
    }
}
