//! Retry / health-check controller
//!
//! Drives the health check through a [`BackoffPolicy`] until the sink is
//! healthy or the policy gives up:
//!
//! ```text
//!            check ok
//! ATTEMPTING ─────────▶ CONNECTED
//!   │    ▲
//!   │    │ check failed, attempts left: wait one backoff interval
//!   └────┘
//!   │
//!   └──────────────────▶ FAILED (bounded policy only)
//!      attempts exhausted
//! ```
//!
//! The controller sets [`ConnectionState`]; a failed bulk request clears it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::backoff::BackoffPolicy;
use crate::client::{HealthCheck, SinkClient};
use crate::error::WriterError;
use crate::metrics::WriterMetrics;

/// Whether the sink is currently considered reachable
///
/// Cheap to clone; all clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct ConnectionState {
    connected: Arc<AtomicBool>,
}

impl ConnectionState {
    /// Create a disconnected state
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the last controller run reached the sink
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// The sink failed a request; the next start must check health again
    pub(crate) fn mark_disconnected(&self) {
        self.set(false);
    }

    fn set(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }
}

/// Runs health checks with backoff
pub struct ConnectionController<C> {
    client: Arc<C>,
    check: HealthCheck,
    state: ConnectionState,
    metrics: Arc<WriterMetrics>,
}

impl<C> Clone for ConnectionController<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            check: self.check.clone(),
            state: self.state.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<C: SinkClient> ConnectionController<C> {
    /// Create a controller probing `client` with `check`
    pub fn new(
        client: Arc<C>,
        check: HealthCheck,
        state: ConnectionState,
        metrics: Arc<WriterMetrics>,
    ) -> Self {
        Self {
            client,
            check,
            state,
            metrics,
        }
    }

    /// Connection state shared with the rest of the writer
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Check health until healthy or until `policy` gives up
    ///
    /// Marks the connection as down for the duration of the run. Returns the
    /// number of checks it took on success.
    pub async fn connect(&self, policy: &BackoffPolicy) -> Result<u32, WriterError> {
        self.state.set(false);
        let mut failed = 0u32;

        loop {
            self.metrics.record_connection_attempt();
            tracing::debug!(attempt = failed + 1, "checking sink health");

            let err = match self.client.check_health(&self.check).await {
                Ok(()) => {
                    self.state.set(true);
                    tracing::info!(attempts = failed + 1, "sink is reachable");
                    return Ok(failed + 1);
                }
                Err(e) => e,
            };

            failed += 1;
            match policy.after_failure(failed) {
                Some(retry) => {
                    tracing::warn!(
                        attempt = retry.count,
                        max_attempts = ?policy.max_attempts,
                        delay_ms = retry.next_delay.as_millis() as u64,
                        error = %err,
                        "health check failed, will retry"
                    );
                    tokio::time::sleep(retry.next_delay).await;
                }
                None => {
                    return Err(WriterError::ReconnectExhausted {
                        attempts: failed,
                        last_error: err.to_string(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "controller_test.rs"]
mod controller_test;
