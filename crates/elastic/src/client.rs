//! Elasticsearch HTTP client

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use serde_json::Value;

use esbulk_writer::{
    BulkRequest, BulkResponse, HealthCheck, SinkClient, SinkClientError, TemplateKind,
};

use crate::config::ElasticConfig;
use crate::error::ElasticError;
use crate::helpers::{
    bulk_query, encode_bulk_body, health_query, is_already_exists, parse_bulk_response,
    parse_health, template_path,
};

/// Extra time granted on top of the server-side health wait
const HEALTH_GRACE: Duration = Duration::from_secs(5);

const NDJSON: &str = "application/x-ndjson";

/// Longest error body kept in error messages
const MAX_ERROR_BODY: usize = 512;

/// [`SinkClient`] for a single Elasticsearch cluster
#[derive(Debug, Clone)]
pub struct ElasticClient {
    config: ElasticConfig,
    http: reqwest::Client,
}

impl ElasticClient {
    /// Create a client
    ///
    /// # Errors
    ///
    /// Returns error if the URL is not http(s), if both basic auth and an API
    /// key are set, or if the HTTP client cannot be built.
    pub fn new(config: ElasticConfig) -> Result<Self, ElasticError> {
        if !(config.url.starts_with("http://") || config.url.starts_with("https://")) {
            return Err(ElasticError::InvalidUrl(config.url));
        }
        if config.api_key.is_some() && config.username.is_some() {
            return Err(ElasticError::InvalidAuth(
                "api_key and username are mutually exclusive".into(),
            ));
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("esbulk/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ElasticConfig {
        &self.config
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut request = self.http.request(method, self.config.endpoint(path));
        if let Some(username) = &self.config.username {
            request = request.basic_auth(username, self.config.password.as_deref());
        } else if let Some(key) = &self.config.api_key
            && let Ok(value) = HeaderValue::from_str(&format!("ApiKey {key}"))
        {
            request = request.header(AUTHORIZATION, value);
        }
        request
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, SinkClientError> {
        request.send().await.map_err(|e| self.transport_error(e))
    }

    fn transport_error(&self, err: reqwest::Error) -> SinkClientError {
        if err.is_timeout() {
            SinkClientError::Timeout(self.config.request_timeout)
        } else {
            SinkClientError::transport(err.to_string())
        }
    }

    async fn body(&self, response: reqwest::Response) -> Result<Vec<u8>, SinkClientError> {
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| self.transport_error(e))
    }

    async fn status_error(&self, response: reqwest::Response) -> SinkClientError {
        let status = response.status().as_u16();
        let body = self.body(response).await.unwrap_or_default();
        SinkClientError::status(status, truncate(&body))
    }
}

impl SinkClient for ElasticClient {
    async fn bulk_submit(&self, request: &BulkRequest) -> Result<BulkResponse, SinkClientError> {
        let response = self
            .send(
                self.request(reqwest::Method::POST, "_bulk")
                    .query(&bulk_query(request))
                    .header(CONTENT_TYPE, NDJSON)
                    .body(encode_bulk_body(request)),
            )
            .await?;

        if !response.status().is_success() {
            return Err(self.status_error(response).await);
        }

        let body = self.body(response).await?;
        let parsed = parse_bulk_response(&body)?;
        tracing::trace!(items = parsed.items.len(), took_ms = ?parsed.took, "bulk response");
        Ok(parsed)
    }

    async fn check_health(&self, check: &HealthCheck) -> Result<(), SinkClientError> {
        let response = self
            .send(
                self.request(reqwest::Method::GET, "_cluster/health")
                    .query(&health_query(check))
                    .timeout(check.timeout + HEALTH_GRACE),
            )
            .await?;

        // 408 carries a regular health body with timed_out set
        let status = response.status();
        if !status.is_success() && status != StatusCode::REQUEST_TIMEOUT {
            return Err(self.status_error(response).await);
        }

        let body = self.body(response).await?;
        parse_health(&body, check)
    }

    async fn template_exists(&self, kind: TemplateKind, name: &str) -> Result<bool, SinkClientError> {
        let response = self
            .send(self.request(reqwest::Method::HEAD, &template_path(kind, name)))
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(self.status_error(response).await),
        }
    }

    async fn template_upsert(
        &self,
        kind: TemplateKind,
        name: &str,
        body: &Value,
    ) -> Result<(), SinkClientError> {
        let response = self
            .send(
                self.request(reqwest::Method::PUT, &template_path(kind, name))
                    .query(&[("create", "true")])
                    .json(body),
            )
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let bytes = self.body(response).await?;
        if status == StatusCode::BAD_REQUEST && is_already_exists(&bytes) {
            tracing::debug!(template = name, "template created concurrently");
            return Ok(());
        }
        Err(SinkClientError::status(status.as_u16(), truncate(&bytes)))
    }
}

fn truncate(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    match text.char_indices().nth(MAX_ERROR_BODY) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.into_owned(),
    }
}
