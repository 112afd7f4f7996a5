//! Elasticsearch client for the bulk writer
//!
//! Implements [`SinkClient`](esbulk_writer::SinkClient) over the Elasticsearch
//! REST API:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | bulk submit | `POST /_bulk` (ndjson) |
//! | health check | `GET /_cluster/health` |
//! | template exists | `HEAD /_template/{name}` or `/_index_template/{name}` |
//! | template upsert | `PUT /_template/{name}?create=true` |

pub mod client;
pub mod config;
pub mod error;
pub mod helpers;


pub use client::ElasticClient;
pub use config::ElasticConfig;
pub use error::ElasticError;
