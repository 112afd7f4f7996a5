//! Elasticsearch client errors

use thiserror::Error;

/// Errors raised while building an [`ElasticClient`](crate::ElasticClient)
///
/// Request-time failures are reported as
/// [`SinkClientError`](esbulk_writer::SinkClientError) instead.
#[derive(Error, Debug)]
pub enum ElasticError {
    /// The base URL is not a usable http(s) URL
    #[error("invalid Elasticsearch URL '{0}'")]
    InvalidUrl(String),

    /// Auth settings contradict each other
    #[error("invalid auth configuration: {0}")]
    InvalidAuth(String),

    /// The HTTP client could not be created
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}
