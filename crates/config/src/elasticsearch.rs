//! Elasticsearch connection configuration

use std::time::Duration;

use serde::Deserialize;

/// `[elasticsearch]` section
///
/// ```toml
/// [elasticsearch]
/// url = "https://es.internal:9200"
/// username = "elastic"
/// password = "changeme"
/// request_timeout = "30s"
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ElasticsearchConfig {
    /// Cluster base URL
    /// Default: http://localhost:9200
    pub url: String,

    /// Basic auth username
    pub username: Option<String>,

    /// Basic auth password (requires `username`)
    pub password: Option<String>,

    /// API key (excludes `username`)
    pub api_key: Option<String>,

    /// HTTP timeout for bulk and template requests
    /// Default: 30s
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            username: None,
            password: None,
            api_key: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}
