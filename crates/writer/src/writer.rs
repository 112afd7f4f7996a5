//! Bulk writer
//!
//! [`BulkWriter`] is the producer-facing handle; [`WriterTask`] is the single
//! worker that owns the scheduler, runs flushes one at a time and drives the
//! connection controller.
//!
//! # Data flow
//!
//! ```text
//! append ─▶ Buffer ─▶ tick ─▶ flush ─▶ bulk_submit
//!                                        │
//!              ┌─────── ok ──────────────┤ itemized results, rejections warned
//!              │                         │
//!              │        err ─────────────┘ rollback ─▶ Buffer
//!              │                             stop scheduler
//!              │                             reconnect (bounded)
//!              │                               └─▶ template ─▶ scheduler start
//!              ▼
//!            done
//! ```
//!
//! The buffer sits behind a mutex held only for the mutation itself (push,
//! swap, rollback merge), never across a network call, so `append` never
//! waits on the sink.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::backoff::BackoffPolicy;
use crate::buffer::{Buffer, BufferedRecord};
use crate::client::{BulkRequest, BulkResponse, SinkClient};
use crate::config::WriterConfig;
use crate::controller::{ConnectionController, ConnectionState};
use crate::error::{SinkClientError, WriterError};
use crate::events::{EventEmitter, WriterEvent};
use crate::metrics::{MetricsSnapshot, WriterMetrics, WriterMetricsHandle};
use crate::scheduler::Scheduler;
use crate::template::{TemplateBootstrapper, TemplateOutcome};

/// Result of one flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Records sent in the bulk request
    pub submitted: usize,
    /// Records the sink accepted
    pub succeeded: usize,
    /// Records the sink rejected individually
    pub rejected: usize,
}

enum Command {
    Start,
    Stop,
    /// The buffer went from empty to non-empty
    Wake,
    Flush(oneshot::Sender<Result<FlushReport, WriterError>>),
    /// Unbuffered mode: send this record on its own
    Dispatch(BufferedRecord),
    Shutdown(oneshot::Sender<MetricsSnapshot>),
}

/// Result of a controller run plus the template bootstrap that followed it
struct ConnectOutcome {
    result: Result<u32, WriterError>,
    template: Option<Result<TemplateOutcome, WriterError>>,
}

type ConnectFuture = Pin<Box<dyn Future<Output = ConnectOutcome> + Send>>;

/// State shared between the handle and the worker
struct Shared {
    buffer: Mutex<Buffer>,
    /// Bumped by stop and shutdown so late flush results can be recognised
    generation: AtomicU64,
    buffering: bool,
    events: EventEmitter,
    metrics: Arc<WriterMetrics>,
    state: ConnectionState,
}

impl Shared {
    #[inline]
    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    #[inline]
    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Walk the itemized results of a completed request
    ///
    /// Each rejected item is reported on its own; one rejection never stops
    /// the others from being processed.
    fn settle(&self, records: &[BufferedRecord], response: &BulkResponse) -> FlushReport {
        let mut report = FlushReport {
            submitted: records.len(),
            ..Default::default()
        };

        if response.items.len() != records.len() {
            tracing::warn!(
                records = records.len(),
                items = response.items.len(),
                "bulk response item count does not match request"
            );
        }

        for (i, record) in records.iter().enumerate() {
            let Some(item) = response.items.get(i) else {
                // Request succeeded but the item is unaccounted for
                report.succeeded += 1;
                continue;
            };

            if item.is_success() {
                report.succeeded += 1;
                continue;
            }

            report.rejected += 1;
            let (kind, reason) = match &item.error {
                Some(e) => (e.kind.clone(), e.reason.clone()),
                None => ("unknown".to_string(), format!("status {}", item.status)),
            };
            self.events.emit(WriterError::ItemRejected {
                destination: record.destination.clone(),
                status: item.status,
                kind,
                reason,
            });
        }

        self.metrics.record_written(report.succeeded as u64);
        self.metrics.record_rejected(report.rejected as u64);
        report
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Producer-facing handle to a bulk writer
///
/// Cheap to clone. All clones feed the same buffer and worker.
#[derive(Clone)]
pub struct BulkWriter {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
}

impl BulkWriter {
    /// Create a writer and the worker task that drives it
    ///
    /// The caller spawns [`WriterTask::run`] and then calls [`start`](Self::start).
    pub fn new<C: SinkClient>(client: C, config: WriterConfig) -> (Self, WriterTask<C>) {
        Self::with_client(Arc::new(client), config)
    }

    /// Like [`new`](Self::new) for a client that is already shared
    pub fn with_client<C: SinkClient>(client: Arc<C>, config: WriterConfig) -> (Self, WriterTask<C>) {
        let metrics = Arc::new(WriterMetrics::new());
        let state = ConnectionState::new();
        let shared = Arc::new(Shared {
            buffer: Mutex::new(Buffer::new(config.buffer_limit)),
            generation: AtomicU64::new(0),
            buffering: config.buffering,
            events: EventEmitter::new(config.event_capacity),
            metrics: Arc::clone(&metrics),
            state: state.clone(),
        });

        let (tx, rx) = mpsc::unbounded_channel();
        let controller =
            ConnectionController::new(Arc::clone(&client), config.health_check.clone(), state, metrics);
        let bootstrapper = config.template.as_ref().map(|t| t.bootstrapper());

        let task = WriterTask {
            client,
            scheduler: Scheduler::new(config.interval),
            config,
            shared: Arc::clone(&shared),
            commands: rx,
            controller,
            bootstrapper,
            connecting: None,
            inflight: JoinSet::new(),
            closing: false,
        };

        (Self { shared, commands: tx }, task)
    }

    /// Queue a record for `destination`
    ///
    /// Never waits on the sink. Fails with [`WriterError::CapacityExceeded`]
    /// when the buffer is full (the record is dropped and a warning emitted)
    /// and with [`WriterError::Closed`] once the worker has exited.
    pub fn append(&self, destination: impl Into<String>, payload: Value) -> Result<(), WriterError> {
        if self.commands.is_closed() {
            return Err(WriterError::Closed);
        }

        let record = BufferedRecord::new(destination, payload);

        if !self.shared.buffering {
            self.send(Command::Dispatch(record))?;
            self.shared.metrics.record_appended();
            return Ok(());
        }

        let was_empty = {
            let mut buffer = self.shared.buffer.lock();
            // The worker closes the channel under this lock before its final swap
            if self.commands.is_closed() {
                return Err(WriterError::Closed);
            }
            let was_empty = buffer.is_empty();
            if let Err(record) = buffer.push(record) {
                let limit = buffer.limit().unwrap_or_default();
                drop(buffer);

                self.shared.metrics.record_dropped_capacity();
                let err = WriterError::CapacityExceeded {
                    destination: record.destination,
                    limit,
                };
                self.shared.events.emit(err.clone());
                return Err(err);
            }
            was_empty
        };

        self.shared.metrics.record_appended();
        if was_empty {
            self.send(Command::Wake)?;
        }
        Ok(())
    }

    /// Connect with the startup profile, then bootstrap and start flushing
    pub fn start(&self) -> Result<(), WriterError> {
        self.send(Command::Start)
    }

    /// Stop scheduled flushing and cancel any connection attempt
    ///
    /// Idempotent. A flush already in flight completes, but its failure no
    /// longer triggers a reconnect.
    pub fn stop(&self) {
        self.shared.bump_generation();
        let _ = self.commands.send(Command::Stop);
    }

    /// Flush the buffer now and wait for the result
    pub async fn flush(&self) -> Result<FlushReport, WriterError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Flush(tx))?;
        rx.await.map_err(|_| WriterError::Closed)?
    }

    /// Stop, flush what is left and wait for the worker to exit
    pub async fn shutdown(&self) -> Result<MetricsSnapshot, WriterError> {
        self.shared.bump_generation();
        let (tx, rx) = oneshot::channel();
        self.send(Command::Shutdown(tx))?;
        rx.await.map_err(|_| WriterError::Closed)
    }

    /// Receive warnings and errors emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<WriterEvent> {
        self.shared.events.subscribe()
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.shared.state.is_connected()
    }

    /// Records waiting in the buffer
    pub fn pending(&self) -> usize {
        self.shared.buffer.lock().len()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    pub fn metrics_handle(&self) -> WriterMetricsHandle {
        WriterMetricsHandle::new(Arc::clone(&self.shared.metrics))
    }

    fn send(&self, command: Command) -> Result<(), WriterError> {
        self.commands.send(command).map_err(|_| WriterError::Closed)
    }
}

// =============================================================================
// Worker
// =============================================================================

/// Worker that flushes the buffer and manages the connection
pub struct WriterTask<C> {
    client: Arc<C>,
    config: WriterConfig,
    shared: Arc<Shared>,
    commands: mpsc::UnboundedReceiver<Command>,
    scheduler: Scheduler,
    controller: ConnectionController<C>,
    bootstrapper: Option<TemplateBootstrapper>,
    /// Controller run in progress, if any
    connecting: Option<ConnectFuture>,
    /// Unbuffered dispatches still in flight
    inflight: JoinSet<()>,
    closing: bool,
}

impl<C: SinkClient> WriterTask<C> {
    /// Run until shutdown or until every handle is dropped
    pub async fn run(mut self) -> MetricsSnapshot {
        tracing::info!(
            interval_ms = self.config.interval.as_millis() as u64,
            buffer_limit = ?self.config.buffer_limit,
            retry_limit = self.config.retry_limit,
            buffering = self.config.buffering,
            "bulk writer starting"
        );

        let mut reply = None;

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(Command::Shutdown(tx)) => {
                            reply = Some(tx);
                            break;
                        }
                        Some(command) => self.handle_command(command).await,
                        None => break, // All handles dropped
                    }
                }
                outcome = next_connection(&mut self.connecting) => {
                    self.connecting = None;
                    self.on_connection(outcome);
                }
                _ = sleep_until_deadline(self.scheduler.deadline()) => {
                    let empty = self.shared.buffer.lock().is_empty();
                    if self.scheduler.tick(Instant::now(), empty) {
                        // Failures have already been reported as events
                        let _ = self.flush().await;
                        self.scheduler.reschedule(Instant::now());
                    } else {
                        tracing::debug!("buffer empty, pausing flush timer");
                    }
                }
                Some(_) = self.inflight.join_next(), if !self.inflight.is_empty() => {}
            }
        }

        let snapshot = self.finish().await;
        if let Some(tx) = reply {
            let _ = tx.send(snapshot);
        }
        snapshot
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start => self.start(),
            Command::Stop => {
                let was_running = self.scheduler.stop();
                if self.connecting.take().is_some() || was_running {
                    tracing::info!("bulk writer stopped");
                }
            }
            Command::Wake => {
                if self.scheduler.resume(Instant::now()) {
                    tracing::debug!("new records, resuming flush timer");
                }
            }
            Command::Flush(tx) => {
                let result = self.flush().await;
                let _ = tx.send(result);
            }
            Command::Dispatch(record) => self.dispatch(record),
            Command::Shutdown(_) => {}
        }
    }

    fn start(&mut self) {
        if self.connecting.is_some() {
            tracing::debug!("connection attempt already in progress");
            return;
        }

        if self.shared.state.is_connected() {
            if self.shared.buffering && !self.scheduler.is_running() {
                self.scheduler.start(Instant::now());
            }
            return;
        }

        tracing::info!("connecting to sink");
        self.connecting = Some(self.connect(self.config.startup_backoff.clone()));
    }

    fn connect(&self, policy: BackoffPolicy) -> ConnectFuture {
        let controller = self.controller.clone();
        let client = Arc::clone(&self.client);
        let bootstrapper = self.bootstrapper.clone();

        Box::pin(async move {
            let result = controller.connect(&policy).await;
            let template = match (&result, bootstrapper) {
                (Ok(_), Some(bootstrapper)) => Some(bootstrapper.ensure(client.as_ref()).await),
                _ => None,
            };
            ConnectOutcome { result, template }
        })
    }

    fn on_connection(&mut self, outcome: ConnectOutcome) {
        match outcome.template {
            Some(Ok(TemplateOutcome::Created)) => self.shared.metrics.record_template_created(),
            Some(Err(e)) => self.shared.events.emit(e),
            _ => {}
        }

        match outcome.result {
            Ok(attempts) => {
                tracing::info!(attempts, "connected to sink");
                if self.shared.buffering {
                    self.scheduler.start(Instant::now());
                }
            }
            Err(e) => {
                // Stays stopped until start() is called again
                self.shared.events.emit(e);
            }
        }
    }

    /// Swap the buffer out and submit it as one bulk request
    async fn flush(&mut self) -> Result<FlushReport, WriterError> {
        let generation = self.shared.generation();
        let records = self.shared.buffer.lock().take();

        if records.is_empty() {
            tracing::debug!("nothing to flush");
            self.scheduler.pause();
            return Ok(FlushReport::default());
        }

        let request = self.build_request(&records);
        self.shared.metrics.record_bulk_request();
        tracing::debug!(records = records.len(), "submitting bulk request");

        match self.client.bulk_submit(&request).await {
            Ok(response) => {
                let report = self.shared.settle(&records, &response);
                tracing::debug!(
                    submitted = report.submitted,
                    succeeded = report.succeeded,
                    rejected = report.rejected,
                    took_ms = ?response.took,
                    "bulk request completed"
                );
                Ok(report)
            }
            Err(e) => Err(self.rollback(records, e, generation)),
        }
    }

    /// Put the records of a failed request back and start reconnecting
    fn rollback(&mut self, records: Vec<BufferedRecord>, cause: SinkClientError, generation: u64) -> WriterError {
        let submitted = records.len();
        self.shared.metrics.record_bulk_failure();
        self.shared.state.mark_disconnected();

        let outcome = self.shared.buffer.lock().rollback(records, self.config.retry_limit);
        self.shared.metrics.record_exhausted(outcome.exhausted.len() as u64);
        self.shared.metrics.record_trimmed(outcome.trimmed.len() as u64);

        let err = WriterError::Transient {
            records: submitted,
            message: cause.to_string(),
        };
        self.shared.events.emit(err.clone());

        for record in outcome.exhausted {
            self.shared.events.emit(WriterError::RetryExhausted {
                destination: record.destination,
                attempts: record.attempt,
            });
        }

        let limit = self.config.buffer_limit.unwrap_or_default();
        for record in outcome.trimmed {
            self.shared.events.emit(WriterError::CapacityExceeded {
                destination: record.destination,
                limit,
            });
        }

        tracing::debug!(requeued = outcome.requeued, "rolled back failed bulk request");

        if self.closing {
            return err;
        }
        if generation != self.shared.generation() {
            tracing::debug!("writer stopped during request, skipping reconnect");
            return err;
        }

        self.scheduler.stop();
        if self.connecting.is_none() {
            tracing::info!("bulk request failed, reconnecting");
            self.connecting = Some(self.connect(self.config.reconnect_backoff.clone()));
        }
        err
    }

    /// Send one record on its own without retry
    fn dispatch(&mut self, record: BufferedRecord) {
        let request = self.build_request(std::slice::from_ref(&record));
        let client = Arc::clone(&self.client);
        let shared = Arc::clone(&self.shared);

        self.inflight.spawn(async move {
            shared.metrics.record_bulk_request();
            match client.bulk_submit(&request).await {
                Ok(response) => {
                    shared.settle(std::slice::from_ref(&record), &response);
                }
                Err(e) => {
                    shared.metrics.record_bulk_failure();
                    shared.metrics.record_failed(1);
                    shared.events.emit(WriterError::Transient {
                        records: 1,
                        message: e.to_string(),
                    });
                }
            }
        });
    }

    fn build_request(&self, records: &[BufferedRecord]) -> BulkRequest {
        BulkRequest::from_records(
            records,
            self.config.pipeline.clone(),
            self.config.wait_for_active_shards,
            self.config.bulk_timeout(),
        )
    }

    /// Stop everything, make a last flush attempt and wait for dispatches
    async fn finish(&mut self) -> MetricsSnapshot {
        self.closing = true;
        self.scheduler.stop();
        self.connecting = None;

        // From here on append fails with Closed instead of filling a buffer
        // nobody will send
        {
            let _buffer = self.shared.buffer.lock();
            self.commands.close();
        }
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::Dispatch(record) => self.dispatch(record),
                Command::Flush(tx) => {
                    let _ = tx.send(Err(WriterError::Closed));
                }
                _ => {}
            }
        }

        let pending = self.shared.buffer.lock().len();
        if pending > 0 {
            tracing::info!(records = pending, "final flush");
            if let Err(e) = self.flush().await {
                tracing::warn!(error = %e, "final flush failed");
            }
        }

        while self.inflight.join_next().await.is_some() {}

        let leftover = self.shared.buffer.lock().take();
        if !leftover.is_empty() {
            self.shared.metrics.record_abandoned(leftover.len() as u64);
            self.shared.events.emit(WriterError::Transient {
                records: leftover.len(),
                message: "writer shut down before the records could be sent".to_string(),
            });
        }

        let snapshot = self.shared.metrics.snapshot();
        tracing::info!(
            appended = snapshot.records_appended,
            written = snapshot.records_written,
            rejected = snapshot.records_rejected,
            exhausted = snapshot.records_exhausted,
            dropped = snapshot.records_dropped_capacity,
            failed = snapshot.records_failed,
            abandoned = snapshot.records_abandoned,
            "bulk writer shutting down"
        );
        snapshot
    }
}

async fn next_connection(connecting: &mut Option<ConnectFuture>) -> ConnectOutcome {
    match connecting {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "writer_test.rs"]
mod writer_test;
