//! Sink client boundary
//!
//! The writer never talks to the network itself. Everything it needs from the
//! remote sink goes through [`SinkClient`]: one bulk submit, one health check
//! and a template existence/upsert pair.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::buffer::BufferedRecord;
use crate::error::SinkClientError;

// =============================================================================
// Bulk request / response
// =============================================================================

/// A single document in a bulk request
#[derive(Debug, Clone, PartialEq)]
pub struct BulkOperation {
    /// Destination index
    pub index: String,
    /// Document body
    pub document: Value,
}

/// Request envelope built from a buffer snapshot at flush time
///
/// Operations keep buffer order. The envelope is discarded once the round
/// trip completes.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkRequest {
    /// Documents in submission order
    pub operations: Vec<BulkOperation>,
    /// Ingest pipeline applied by the sink
    pub pipeline: Option<String>,
    /// Shard copies that must be active before the write proceeds
    pub wait_for_active_shards: Option<ActiveShards>,
    /// Server-side timeout for the request
    pub timeout: Duration,
}

impl BulkRequest {
    /// Build an envelope from buffered records
    pub fn from_records(
        records: &[BufferedRecord],
        pipeline: Option<String>,
        wait_for_active_shards: Option<ActiveShards>,
        timeout: Duration,
    ) -> Self {
        let operations = records
            .iter()
            .map(|r| BulkOperation {
                index: r.destination.clone(),
                document: r.payload.clone(),
            })
            .collect();

        Self {
            operations,
            pipeline,
            wait_for_active_shards,
            timeout,
        }
    }

    /// Number of documents in the request
    #[inline]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the request carries no documents
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Per-item failure detail reported by the sink
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ItemError {
    /// Error type (e.g. `mapper_parsing_exception`)
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Human-readable reason
    #[serde(default)]
    pub reason: String,
}

/// Outcome of one document in a bulk request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItem {
    /// Index the document was routed to
    pub index: String,
    /// HTTP-style status for this item
    pub status: u16,
    /// Failure detail, present when the item was rejected
    pub error: Option<ItemError>,
}

impl BulkItem {
    /// Successful item
    pub fn ok(index: impl Into<String>, status: u16) -> Self {
        Self {
            index: index.into(),
            status,
            error: None,
        }
    }

    /// Rejected item
    pub fn rejected(
        index: impl Into<String>,
        status: u16,
        kind: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            index: index.into(),
            status,
            error: Some(ItemError {
                kind: kind.into(),
                reason: reason.into(),
            }),
        }
    }

    /// Whether the sink accepted this item
    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status)
    }
}

/// Itemized result of a bulk request that completed at the request level
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkResponse {
    /// Time the sink spent on the request, in milliseconds
    pub took: Option<u64>,
    /// One entry per operation, in request order
    pub items: Vec<BulkItem>,
}

impl BulkResponse {
    /// Whether any item was rejected
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|item| !item.is_success())
    }
}

// =============================================================================
// Request options
// =============================================================================

/// Number of active shard copies required before a write proceeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveShards {
    /// Every copy must be active
    All,
    /// At least this many copies
    Count(u32),
}

impl fmt::Display for ActiveShards {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Count(n) => write!(f, "{n}"),
        }
    }
}

/// Cluster health level, ordered from worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Red,
    #[default]
    Yellow,
    Green,
}

impl HealthStatus {
    /// Lowercase name as used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Yellow => "yellow",
            Self::Green => "green",
        }
    }

    /// Whether this status satisfies `minimum`
    #[inline]
    pub fn at_least(self, minimum: HealthStatus) -> bool {
        self >= minimum
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Criteria for the health check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheck {
    /// How long the sink may wait for the criteria to be met
    pub timeout: Duration,
    /// Minimum number of nodes
    pub min_nodes: u32,
    /// Minimum cluster status
    pub min_status: HealthStatus,
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            min_nodes: 1,
            min_status: HealthStatus::Yellow,
        }
    }
}

/// Template API flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemplateKind {
    /// `_template` API
    #[default]
    Legacy,
    /// `_index_template` API
    Composable,
}

impl TemplateKind {
    /// Name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Composable => "composable",
        }
    }
}

// =============================================================================
// Client trait
// =============================================================================

/// Capabilities the writer consumes from the remote sink
///
/// Implementations own transport and serialization. They must be cheap to
/// share: the writer holds one instance behind an `Arc` and calls it from its
/// worker task and from fire-and-forget dispatch tasks.
pub trait SinkClient: Send + Sync + 'static {
    /// Submit a batch of documents in one round trip
    ///
    /// `Err` means the request as a whole failed. A request that completed
    /// returns `Ok` even when individual items were rejected.
    fn bulk_submit(
        &self,
        request: &BulkRequest,
    ) -> impl Future<Output = Result<BulkResponse, SinkClientError>> + Send;

    /// Check that the sink is reachable and meets `check`
    fn check_health(
        &self,
        check: &HealthCheck,
    ) -> impl Future<Output = Result<(), SinkClientError>> + Send;

    /// Whether a template with this name exists
    fn template_exists(
        &self,
        kind: TemplateKind,
        name: &str,
    ) -> impl Future<Output = Result<bool, SinkClientError>> + Send;

    /// Create the template if it does not exist yet
    fn template_upsert(
        &self,
        kind: TemplateKind,
        name: &str,
        body: &Value,
    ) -> impl Future<Output = Result<(), SinkClientError>> + Send;
}
