//! Tests for the bulk writer
//!
//! All timing tests run on tokio's paused clock, so intervals and backoff
//! delays elapse instantly and deterministically.

use std::time::Duration;

use serde_json::json;
use tokio::sync::broadcast;
use tokio::time::sleep;

use super::*;
use crate::client::ActiveShards;
use crate::config::TemplateConfig;
use crate::mock::{BulkOutcome, MockSink};

fn spawn_writer(config: WriterConfig) -> (BulkWriter, Arc<MockSink>) {
    let sink = Arc::new(MockSink::new());
    let (writer, task) = BulkWriter::with_client(Arc::clone(&sink), config);
    tokio::spawn(task.run());
    (writer, sink)
}

fn doc(message: &str) -> Value {
    json!({ "message": message })
}

async fn next_event(rx: &mut broadcast::Receiver<WriterEvent>) -> WriterEvent {
    rx.recv().await.unwrap()
}

// =============================================================================
// Append
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_append_refused_when_full() {
    let (writer, _sink) = spawn_writer(WriterConfig::default().with_buffer_limit(2));
    let mut events = writer.subscribe();

    writer.append("logs", doc("A")).unwrap();
    writer.append("logs", doc("B")).unwrap();
    let err = writer.append("logs", doc("C")).unwrap_err();

    assert!(matches!(err, WriterError::CapacityExceeded { limit: 2, .. }));
    assert_eq!(writer.pending(), 2);

    let event = next_event(&mut events).await;
    assert!(event.is_warning());
    assert!(matches!(event.error(), WriterError::CapacityExceeded { .. }));

    let m = writer.metrics();
    assert_eq!(m.records_appended, 2);
    assert_eq!(m.records_dropped_capacity, 1);
}

#[tokio::test(start_paused = true)]
async fn test_append_after_shutdown_is_closed() {
    let (writer, sink) = spawn_writer(WriterConfig::default());

    writer.append("logs", doc("A")).unwrap();
    writer.append("logs", doc("B")).unwrap();

    // Final flush sends what was buffered even though the writer never started
    let snapshot = writer.shutdown().await.unwrap();
    assert_eq!(snapshot.records_written, 2);
    assert_eq!(sink.bulk_calls(), 1);

    assert!(matches!(writer.append("logs", doc("C")), Err(WriterError::Closed)));
    assert!(matches!(writer.flush().await, Err(WriterError::Closed)));
}

#[tokio::test(start_paused = true)]
async fn test_append_during_final_flush_is_closed() {
    let (writer, sink) = spawn_writer(WriterConfig::default());
    sink.set_bulk_delay(Duration::from_secs(1));

    writer.append("logs", doc("A")).unwrap();
    let closing = {
        let writer = writer.clone();
        tokio::spawn(async move { writer.shutdown().await })
    };

    // Final flush is in flight
    sleep(Duration::from_millis(100)).await;
    assert_eq!(sink.bulk_calls(), 1);
    assert!(matches!(writer.append("logs", doc("B")), Err(WriterError::Closed)));

    let snapshot = closing.await.unwrap().unwrap();
    assert_eq!(sink.sent_messages(), vec![vec!["A".to_string()]]);
    assert_eq!(writer.pending(), 0);
    assert_eq!(snapshot.records_appended, 1);
    assert_eq!(snapshot.records_written, 1);
    assert_eq!(snapshot.records_lost(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_records_left_after_failed_final_flush_are_counted() {
    let (writer, sink) = spawn_writer(WriterConfig::default());
    sink.script_bulk([BulkOutcome::Fail]);

    writer.append("logs", doc("A")).unwrap();
    writer.append("logs", doc("B")).unwrap();

    let snapshot = writer.shutdown().await.unwrap();
    assert_eq!(sink.bulk_calls(), 1);
    assert_eq!(snapshot.records_abandoned, 2);
    assert_eq!(snapshot.records_lost(), 2);
    assert_eq!(writer.pending(), 0);
}

// =============================================================================
// Flush
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_flush_empty_buffer_skips_network() {
    let (writer, sink) = spawn_writer(WriterConfig::default());

    let report = writer.flush().await.unwrap();

    assert_eq!(report, FlushReport::default());
    assert_eq!(sink.bulk_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_request_carries_options() {
    let config = WriterConfig::default()
        .with_interval(Duration::from_millis(500))
        .with_pipeline("geoip")
        .with_wait_for_active_shards(Some(ActiveShards::All));
    let (writer, sink) = spawn_writer(config);

    writer.append("logs-2024.01.01", doc("A")).unwrap();
    writer.flush().await.unwrap();

    let requests = sink.requests.lock();
    let request = &requests[0];
    assert_eq!(request.pipeline.as_deref(), Some("geoip"));
    assert_eq!(request.wait_for_active_shards, Some(ActiveShards::All));
    assert_eq!(request.timeout, Duration::from_millis(500));
    assert_eq!(request.operations[0].index, "logs-2024.01.01");
}

#[tokio::test(start_paused = true)]
async fn test_item_rejections_do_not_short_circuit() {
    let (writer, sink) = spawn_writer(WriterConfig::default());
    let mut events = writer.subscribe();
    sink.script_bulk([BulkOutcome::RejectItems(vec![0, 2])]);

    for name in ["A", "B", "C", "D"] {
        writer.append("logs", doc(name)).unwrap();
    }
    let report = writer.flush().await.unwrap();

    assert_eq!(
        report,
        FlushReport {
            submitted: 4,
            succeeded: 2,
            rejected: 2,
        }
    );

    for _ in 0..2 {
        let event = next_event(&mut events).await;
        assert!(event.is_warning());
        assert!(matches!(
            event.error(),
            WriterError::ItemRejected { status: 400, kind, .. } if kind == "mapper_parsing_exception"
        ));
    }

    // Rejected items are terminal, never requeued
    assert_eq!(writer.pending(), 0);
    let m = writer.metrics();
    assert_eq!(m.records_written, 2);
    assert_eq!(m.records_rejected, 2);
    assert_eq!(m.bulk_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_appends_during_flight_land_after_rollback() {
    let (writer, sink) = spawn_writer(WriterConfig::default());
    sink.set_bulk_delay(Duration::from_secs(1));
    sink.script_bulk([BulkOutcome::Fail]);

    writer.append("logs", doc("A")).unwrap();
    writer.append("logs", doc("B")).unwrap();

    let flusher = writer.clone();
    let inflight = tokio::spawn(async move { flusher.flush().await });

    sleep(Duration::from_millis(100)).await;
    assert_eq!(writer.pending(), 0);
    writer.append("logs", doc("C")).unwrap();

    let err = inflight.await.unwrap().unwrap_err();
    assert!(matches!(err, WriterError::Transient { records: 2, .. }));

    // Reconnect succeeds and the next flush carries everything once, in order
    sleep(Duration::from_secs(5)).await;
    assert_eq!(
        sink.sent_messages(),
        vec![vec!["A", "B"], vec!["A", "B", "C"]]
    );
    assert_eq!(writer.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rollback_trims_to_capacity() {
    let (writer, sink) = spawn_writer(WriterConfig::default().with_buffer_limit(3));
    let mut events = writer.subscribe();
    sink.set_bulk_delay(Duration::from_secs(1));
    sink.script_bulk([BulkOutcome::Fail]);

    writer.append("logs", doc("A")).unwrap();
    writer.append("logs", doc("B")).unwrap();

    let flusher = writer.clone();
    let inflight = tokio::spawn(async move { flusher.flush().await });
    sleep(Duration::from_millis(100)).await;

    writer.append("logs", doc("C")).unwrap();
    writer.append("logs", doc("D")).unwrap();
    writer.append("logs", doc("E")).unwrap();

    assert!(inflight.await.unwrap().is_err());

    assert!(matches!(
        next_event(&mut events).await.error(),
        WriterError::Transient { records: 2, .. }
    ));
    for _ in 0..2 {
        let event = next_event(&mut events).await;
        assert!(matches!(event.error(), WriterError::CapacityExceeded { limit: 3, .. }));
    }
    assert_eq!(writer.metrics().records_trimmed, 2);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(sink.sent_messages()[1], vec!["A", "B", "C"]);
}

// =============================================================================
// Retry limit
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_records_dropped_after_retry_limit() {
    let config = WriterConfig::default()
        .with_buffer_limit(2)
        .with_retry_limit(1);
    let (writer, sink) = spawn_writer(config);
    let mut events = writer.subscribe();
    sink.script_bulk([BulkOutcome::Fail, BulkOutcome::Fail]);

    writer.append("logs", doc("A")).unwrap();
    writer.append("logs", doc("B")).unwrap();
    assert!(writer.append("logs", doc("C")).is_err());
    assert!(matches!(
        next_event(&mut events).await.error(),
        WriterError::CapacityExceeded { .. }
    ));

    writer.start().unwrap();

    // First failure: both requeued with one attempt
    let event = next_event(&mut events).await;
    assert!(matches!(event, WriterEvent::Warning(WriterError::Transient { records: 2, .. })));

    // Second failure: both exceed the limit and are dropped, one error each
    let event = next_event(&mut events).await;
    assert!(matches!(event, WriterEvent::Warning(WriterError::Transient { records: 2, .. })));
    for _ in 0..2 {
        let event = next_event(&mut events).await;
        assert!(matches!(
            event,
            WriterEvent::Error(WriterError::RetryExhausted { attempts: 2, .. })
        ));
    }

    assert_eq!(sink.sent_messages(), vec![vec!["A", "B"], vec!["A", "B"]]);
    assert_eq!(writer.pending(), 0);
    assert_eq!(writer.metrics().records_exhausted, 2);
}

// =============================================================================
// Scheduling
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_healthy_sink_drains_every_record_once() {
    let (writer, sink) = spawn_writer(WriterConfig::default());
    writer.start().unwrap();

    for i in 0..10 {
        writer.append("logs", doc(&i.to_string())).unwrap();
        sleep(Duration::from_millis(700)).await;
    }
    let snapshot = writer.shutdown().await.unwrap();

    let mut sent: Vec<String> = sink.sent_messages().into_iter().flatten().collect();
    sent.sort_by_key(|s| s.parse::<u32>().unwrap_or_default());
    let expected: Vec<String> = (0..10).map(|i| i.to_string()).collect();
    assert_eq!(sent, expected);
    assert_eq!(snapshot.records_written, 10);
    assert_eq!(snapshot.records_lost(), 0);
    assert!(sink.bulk_calls() > 1);
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_pauses_when_idle_and_resumes_on_append() {
    let (writer, sink) = spawn_writer(WriterConfig::default());
    writer.start().unwrap();

    // First tick finds nothing and pauses
    sleep(Duration::from_secs(10)).await;
    assert!(writer.is_connected());
    assert_eq!(sink.bulk_calls(), 0);

    writer.append("logs", doc("A")).unwrap();

    // Resumed timer fires one interval after the append
    sleep(Duration::from_millis(1500)).await;
    assert_eq!(sink.bulk_calls(), 0);
    sleep(Duration::from_secs(1)).await;
    assert_eq!(sink.bulk_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_prevents_scheduled_flush() {
    let (writer, sink) = spawn_writer(WriterConfig::default());
    writer.start().unwrap();
    sleep(Duration::from_millis(100)).await;

    writer.stop();
    writer.stop();
    writer.append("logs", doc("A")).unwrap();

    sleep(Duration::from_secs(10)).await;
    assert_eq!(sink.bulk_calls(), 0);
    assert_eq!(writer.pending(), 1);

    writer.start().unwrap();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(sink.bulk_calls(), 1);
    assert_eq!(writer.pending(), 0);
}

// =============================================================================
// Reconnect
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_stale_failure_skips_reconnect() {
    let (writer, sink) = spawn_writer(WriterConfig::default());
    sink.set_bulk_delay(Duration::from_secs(1));
    sink.script_bulk([BulkOutcome::Fail]);

    writer.append("logs", doc("A")).unwrap();
    writer.start().unwrap();

    sleep(Duration::from_millis(500)).await;
    assert_eq!(sink.bulk_calls(), 1);
    writer.stop();

    sleep(Duration::from_secs(10)).await;
    // Records are kept, but no reconnect happens after stop
    assert_eq!(sink.health_calls(), 1);
    assert_eq!(sink.bulk_calls(), 1);
    assert_eq!(writer.pending(), 1);
    // A later start checks health again before sending
    assert!(!writer.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_start_while_flushing_does_not_skip_reconnect() {
    let (writer, sink) = spawn_writer(WriterConfig::default().with_retry_limit(1));
    sink.set_bulk_delay(Duration::from_secs(1));
    sink.script_bulk([BulkOutcome::Fail, BulkOutcome::Fail]);

    writer.append("logs", doc("A")).unwrap();
    writer.start().unwrap();

    sleep(Duration::from_millis(500)).await;
    assert_eq!(sink.bulk_calls(), 1);
    assert_eq!(sink.health_calls(), 1);
    // Already connected and flushing: a repeated start changes nothing
    writer.start().unwrap();

    // The failure at 1s still triggers a health check before the next send
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(sink.health_calls(), 2);
    assert_eq!(sink.bulk_calls(), 2);
    assert_eq!(writer.metrics().records_exhausted, 0);

    sleep(Duration::from_secs(1)).await;
    assert_eq!(sink.health_calls(), 3);
    assert_eq!(writer.metrics().records_exhausted, 1);
    assert_eq!(writer.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_exhausted_until_restarted() {
    let reconnect = BackoffPolicy::bounded(2, 1.0, Duration::from_secs(1), Duration::from_secs(1));
    let (writer, sink) = spawn_writer(WriterConfig::default().with_reconnect_backoff(reconnect));
    let mut events = writer.subscribe();
    sink.script_health([true, false, false]);
    sink.script_bulk([BulkOutcome::Fail]);

    writer.append("logs", doc("A")).unwrap();
    writer.start().unwrap();

    assert!(matches!(
        next_event(&mut events).await,
        WriterEvent::Warning(WriterError::Transient { .. })
    ));
    assert!(matches!(
        next_event(&mut events).await,
        WriterEvent::Error(WriterError::ReconnectExhausted { attempts: 2, .. })
    ));

    sleep(Duration::from_secs(30)).await;
    assert!(!writer.is_connected());
    assert_eq!(sink.health_calls(), 3);
    assert_eq!(sink.bulk_calls(), 1);
    assert_eq!(writer.pending(), 1);

    // External restart uses the startup profile and drains the buffer
    writer.start().unwrap();
    sleep(Duration::from_millis(100)).await;
    assert!(writer.is_connected());
    assert_eq!(sink.bulk_calls(), 2);
    assert_eq!(writer.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_manual_flush_while_connecting() {
    let (writer, sink) = spawn_writer(WriterConfig::default());
    sink.set_unhealthy(true);

    writer.append("logs", doc("A")).unwrap();
    writer.start().unwrap();
    sleep(Duration::from_millis(1500)).await;
    assert!(!writer.is_connected());

    // The write goes through even though the health check keeps failing
    let report = writer.flush().await.unwrap();
    assert_eq!(report.succeeded, 1);

    sink.set_unhealthy(false);
    sleep(Duration::from_secs(2)).await;
    assert!(writer.is_connected());
}

// =============================================================================
// Template bootstrap
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_template_checked_on_every_connect() {
    let config = WriterConfig::default().with_template(TemplateConfig::for_prefix("logs"));
    let (writer, sink) = spawn_writer(config);
    sink.script_bulk([BulkOutcome::Fail]);

    writer.append("logs", doc("A")).unwrap();
    writer.start().unwrap();
    sleep(Duration::from_secs(5)).await;

    // Created on startup, found present after the reconnect
    assert_eq!(sink.exists_calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    assert_eq!(sink.upsert_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(writer.metrics().templates_created, 1);
    assert_eq!(sink.bulk_calls(), 2);
    assert_eq!(writer.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_template_failure_does_not_block_writes() {
    let config = WriterConfig::default().with_template(TemplateConfig::for_prefix("logs"));
    let (writer, sink) = spawn_writer(config);
    let mut events = writer.subscribe();
    sink.set_upsert_fails(true);

    writer.append("logs", doc("A")).unwrap();
    writer.start().unwrap();

    let event = next_event(&mut events).await;
    assert!(event.is_warning());
    assert!(matches!(event.error(), WriterError::TemplateBootstrap { .. }));

    sleep(Duration::from_millis(100)).await;
    assert_eq!(sink.bulk_calls(), 1);
    assert_eq!(writer.metrics().records_written, 1);
}

// =============================================================================
// Unbuffered mode
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_unbuffered_dispatches_each_record() {
    let (writer, sink) = spawn_writer(WriterConfig::default().with_buffering(false));
    let mut events = writer.subscribe();
    sink.script_bulk([BulkOutcome::Accept, BulkOutcome::Fail]);

    writer.append("logs", doc("A")).unwrap();
    writer.append("logs", doc("B")).unwrap();

    let event = next_event(&mut events).await;
    assert!(matches!(event.error(), WriterError::Transient { records: 1, .. }));

    assert_eq!(sink.bulk_calls(), 2);
    assert!(sink.requests.lock().iter().all(|r| r.len() == 1));
    assert_eq!(writer.pending(), 0);
    // No retry and no health check
    assert_eq!(sink.health_calls(), 0);

    let snapshot = writer.shutdown().await.unwrap();
    assert_eq!(snapshot.records_written, 1);
    assert_eq!(snapshot.bulk_failures, 1);
    assert_eq!(snapshot.records_failed, 1);
    assert_eq!(snapshot.records_lost(), 1);
}
