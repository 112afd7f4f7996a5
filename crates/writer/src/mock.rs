//! Scripted in-memory sink for writer tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;

use crate::client::{BulkItem, BulkRequest, BulkResponse, HealthCheck, SinkClient, TemplateKind};
use crate::error::SinkClientError;

/// Scripted result of one bulk call
#[derive(Debug, Clone)]
pub enum BulkOutcome {
    /// Every item succeeds
    Accept,
    /// The request fails as a whole
    Fail,
    /// The request succeeds but the items at these positions are rejected
    RejectItems(Vec<usize>),
}

#[derive(Debug, Default)]
pub struct MockSink {
    bulk_script: Mutex<VecDeque<BulkOutcome>>,
    health_script: Mutex<VecDeque<bool>>,
    always_unhealthy: AtomicBool,
    bulk_delay: Mutex<Option<Duration>>,
    template_present: AtomicBool,
    upsert_fails: AtomicBool,

    pub requests: Mutex<Vec<BulkRequest>>,
    pub health_calls: AtomicU32,
    pub exists_calls: AtomicU32,
    pub upsert_calls: AtomicU32,
    pub upserted: Mutex<Vec<(TemplateKind, String, Value)>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bulk outcomes; once drained every call is accepted
    pub fn script_bulk(&self, outcomes: impl IntoIterator<Item = BulkOutcome>) {
        self.bulk_script.lock().extend(outcomes);
    }

    /// Queue health check results; once drained checks succeed
    pub fn script_health(&self, results: impl IntoIterator<Item = bool>) {
        self.health_script.lock().extend(results);
    }

    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.always_unhealthy.store(unhealthy, Ordering::SeqCst);
    }

    pub fn set_bulk_delay(&self, delay: Duration) {
        *self.bulk_delay.lock() = Some(delay);
    }

    pub fn set_template_present(&self, present: bool) {
        self.template_present.store(present, Ordering::SeqCst);
    }

    pub fn set_upsert_fails(&self, fails: bool) {
        self.upsert_fails.store(fails, Ordering::SeqCst);
    }

    pub fn bulk_calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn health_calls(&self) -> u32 {
        self.health_calls.load(Ordering::SeqCst)
    }

    /// `message` field of every document sent, per request
    pub fn sent_messages(&self) -> Vec<Vec<String>> {
        self.requests
            .lock()
            .iter()
            .map(|req| {
                req.operations
                    .iter()
                    .map(|op| op.document["message"].as_str().unwrap_or_default().to_string())
                    .collect()
            })
            .collect()
    }
}

impl SinkClient for MockSink {
    async fn bulk_submit(&self, request: &BulkRequest) -> Result<BulkResponse, SinkClientError> {
        self.requests.lock().push(request.clone());
        let outcome = self.bulk_script.lock().pop_front().unwrap_or(BulkOutcome::Accept);

        let delay = *self.bulk_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let reject = match outcome {
            BulkOutcome::Accept => Vec::new(),
            BulkOutcome::Fail => return Err(SinkClientError::transport("connection refused")),
            BulkOutcome::RejectItems(positions) => positions,
        };

        let items = request
            .operations
            .iter()
            .enumerate()
            .map(|(i, op)| {
                if reject.contains(&i) {
                    BulkItem::rejected(&op.index, 400, "mapper_parsing_exception", "bad field")
                } else {
                    BulkItem::ok(&op.index, 201)
                }
            })
            .collect();

        Ok(BulkResponse { took: Some(1), items })
    }

    async fn check_health(&self, _check: &HealthCheck) -> Result<(), SinkClientError> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        let healthy = self.health_script.lock().pop_front().unwrap_or(true)
            && !self.always_unhealthy.load(Ordering::SeqCst);
        if healthy {
            Ok(())
        } else {
            Err(SinkClientError::transport("connection refused"))
        }
    }

    async fn template_exists(&self, _kind: TemplateKind, _name: &str) -> Result<bool, SinkClientError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.template_present.load(Ordering::SeqCst))
    }

    async fn template_upsert(
        &self,
        kind: TemplateKind,
        name: &str,
        body: &Value,
    ) -> Result<(), SinkClientError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        if self.upsert_fails.load(Ordering::SeqCst) {
            return Err(SinkClientError::status(403, "forbidden"));
        }
        self.upserted.lock().push((kind, name.to_string(), body.clone()));
        self.template_present.store(true, Ordering::SeqCst);
        Ok(())
    }
}
