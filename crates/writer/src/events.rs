//! Writer event channel
//!
//! Every problem the writer hits is broadcast to subscribers and logged.
//! Recoverable problems go out as warnings, fatal ones as errors.

use tokio::sync::broadcast;

use crate::error::{Severity, WriterError};

/// Default number of events a slow subscriber may lag behind
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Event delivered to subscribers
#[derive(Debug, Clone)]
pub enum WriterEvent {
    /// The writer recovered or will retry on its own
    Warning(WriterError),
    /// Data was lost or the writer stopped trying
    Error(WriterError),
}

impl WriterEvent {
    /// Wrap an error according to its severity
    pub fn from_error(err: WriterError) -> Self {
        match err.severity() {
            Severity::Recoverable => Self::Warning(err),
            Severity::Fatal => Self::Error(err),
        }
    }

    /// The underlying error
    pub fn error(&self) -> &WriterError {
        match self {
            Self::Warning(err) | Self::Error(err) => err,
        }
    }

    #[inline]
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::Warning(_))
    }
}

/// Sending half of the event channel
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<WriterEvent>,
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Register a new subscriber
    ///
    /// Subscribers only see events emitted after they subscribed.
    pub fn subscribe(&self) -> broadcast::Receiver<WriterEvent> {
        self.tx.subscribe()
    }

    /// Log `err` and broadcast it
    pub fn emit(&self, err: WriterError) {
        match err.severity() {
            Severity::Recoverable => tracing::warn!(error = %err, "bulk writer warning"),
            Severity::Fatal => tracing::error!(error = %err, "bulk writer error"),
        }

        // No subscribers is fine; the log line above is the fallback
        let _ = self.tx.send(WriterEvent::from_error(err));
    }
}
