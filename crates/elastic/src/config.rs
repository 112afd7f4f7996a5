//! Elasticsearch connection configuration

use std::time::Duration;

/// Default cluster URL
pub const DEFAULT_URL: &str = "http://localhost:9200";

/// Default HTTP request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`ElasticClient`](crate::ElasticClient)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElasticConfig {
    /// Base URL (e.g., "http://localhost:9200")
    pub url: String,

    /// Username for basic authentication
    pub username: Option<String>,

    /// Password for basic authentication
    pub password: Option<String>,

    /// API key, sent as `Authorization: ApiKey <key>`
    pub api_key: Option<String>,

    /// HTTP timeout for bulk and template requests
    pub request_timeout: Duration,
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            username: None,
            password: None,
            api_key: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ElasticConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.username = Some(username.into());
        self.password = password;
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Full URL for an API path
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_cleanly() {
        let config = ElasticConfig::new("http://es:9200/");
        assert_eq!(config.endpoint("/_bulk"), "http://es:9200/_bulk");
        assert_eq!(config.endpoint("_cluster/health"), "http://es:9200/_cluster/health");
    }

    #[test]
    fn test_defaults() {
        let config = ElasticConfig::default();
        assert_eq!(config.url, DEFAULT_URL);
        assert!(config.username.is_none());
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }
}
