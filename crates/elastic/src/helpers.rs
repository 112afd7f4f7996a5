//! Elasticsearch wire format helpers
//!
//! Pure functions for building request bodies and query strings and for
//! decoding responses, kept apart from the HTTP plumbing so they can be tested
//! without a server.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use esbulk_writer::{
    BulkItem, BulkRequest, BulkResponse, HealthCheck, HealthStatus, ItemError, SinkClientError,
    TemplateKind,
};

/// Render a duration the way Elasticsearch time units expect (`1500ms`)
pub fn time_value(duration: Duration) -> String {
    format!("{}ms", duration.as_millis())
}

// =============================================================================
// Bulk
// =============================================================================

/// Encode a bulk request as ndjson
///
/// One action line followed by one document line per operation; the body is
/// newline terminated.
pub fn encode_bulk_body(request: &BulkRequest) -> String {
    let mut body = String::with_capacity(request.len() * 128);
    for op in &request.operations {
        let action = serde_json::json!({ "index": { "_index": op.index } });
        body.push_str(&action.to_string());
        body.push('\n');
        body.push_str(&op.document.to_string());
        body.push('\n');
    }
    body
}

/// Query parameters for `POST /_bulk`
pub fn bulk_query(request: &BulkRequest) -> Vec<(&'static str, String)> {
    let mut query = vec![("timeout", time_value(request.timeout))];
    if let Some(pipeline) = &request.pipeline {
        query.push(("pipeline", pipeline.clone()));
    }
    if let Some(shards) = request.wait_for_active_shards {
        query.push(("wait_for_active_shards", shards.to_string()));
    }
    query
}

#[derive(Deserialize)]
struct RawBulkResponse {
    took: Option<u64>,
    #[serde(default)]
    items: Vec<HashMap<String, RawBulkItem>>,
}

#[derive(Deserialize)]
struct RawBulkItem {
    #[serde(rename = "_index", default)]
    index: String,
    status: u16,
    error: Option<ItemError>,
}

/// Decode the body of a completed `_bulk` request
///
/// Each item is an object keyed by its action (`index`, `create`, ...); only
/// the action result inside is kept.
pub fn parse_bulk_response(body: &[u8]) -> Result<BulkResponse, SinkClientError> {
    let raw: RawBulkResponse =
        serde_json::from_slice(body).map_err(|e| SinkClientError::Decode(e.to_string()))?;

    let items = raw
        .items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            item.into_values()
                .next()
                .map(|r| BulkItem {
                    index: r.index,
                    status: r.status,
                    error: r.error,
                })
                .ok_or_else(|| SinkClientError::Decode(format!("bulk item {i} has no action")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(BulkResponse {
        took: raw.took,
        items,
    })
}

// =============================================================================
// Health
// =============================================================================

/// Query parameters for `GET /_cluster/health`
pub fn health_query(check: &HealthCheck) -> Vec<(&'static str, String)> {
    vec![
        ("wait_for_status", check.min_status.as_str().to_string()),
        ("wait_for_nodes", format!(">={}", check.min_nodes)),
        ("timeout", time_value(check.timeout)),
    ]
}

#[derive(Debug, Deserialize)]
struct RawHealth {
    status: HealthStatus,
    #[serde(default)]
    timed_out: bool,
    #[serde(default)]
    number_of_nodes: u32,
}

/// Decide whether a cluster health body meets `check`
pub fn parse_health(body: &[u8], check: &HealthCheck) -> Result<(), SinkClientError> {
    let health: RawHealth =
        serde_json::from_slice(body).map_err(|e| SinkClientError::Decode(e.to_string()))?;

    if health.timed_out {
        return Err(SinkClientError::unhealthy(format!(
            "timed out waiting for status {} (cluster is {})",
            check.min_status, health.status
        )));
    }
    if !health.status.at_least(check.min_status) {
        return Err(SinkClientError::unhealthy(format!(
            "cluster status {} is below {}",
            health.status, check.min_status
        )));
    }
    if health.number_of_nodes < check.min_nodes {
        return Err(SinkClientError::unhealthy(format!(
            "{} nodes, need at least {}",
            health.number_of_nodes, check.min_nodes
        )));
    }
    Ok(())
}

// =============================================================================
// Templates
// =============================================================================

/// API path for a template
pub fn template_path(kind: TemplateKind, name: &str) -> String {
    match kind {
        TemplateKind::Legacy => format!("_template/{name}"),
        TemplateKind::Composable => format!("_index_template/{name}"),
    }
}

#[derive(Deserialize)]
struct RawErrorBody {
    error: RawError,
}

#[derive(Deserialize)]
struct RawError {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    reason: String,
}

/// Whether an error body says the template was created concurrently
pub fn is_already_exists(body: &[u8]) -> bool {
    match serde_json::from_slice::<RawErrorBody>(body) {
        Ok(raw) => {
            raw.error.kind == "resource_already_exists_exception"
                || raw.error.reason.contains("already exists")
        }
        Err(_) => false,
    }
}
