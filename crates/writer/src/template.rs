//! Template bootstrapper
//!
//! Runs after every successful (re)connection when enabled. Checks whether the
//! template exists and creates it when absent, using the configured body or a
//! built-in logstash-style default. Failures are reported to the caller as a
//! recoverable [`WriterError::TemplateBootstrap`]; writes proceed either way.

use serde_json::{Value, json};

use crate::client::{SinkClient, TemplateKind};
use crate::error::WriterError;

/// Name and body of the template to ensure
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateSpec {
    /// Template name on the sink
    pub name: String,
    /// Index pattern the built-in body applies to (e.g. `logs-*`)
    pub index_pattern: String,
    /// Caller-supplied body, sent as is
    pub body: Option<Value>,
}

impl TemplateSpec {
    /// Template named `template_<prefix>` matching `<prefix>-*`
    pub fn for_prefix(prefix: &str) -> Self {
        Self {
            name: format!("template_{prefix}"),
            index_pattern: format!("{prefix}-*"),
            body: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// What the bootstrapper found on the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateOutcome {
    AlreadyPresent,
    Created,
}

/// Template bootstrapper, one variant per template API
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateBootstrapper {
    Legacy(TemplateSpec),
    Composable(TemplateSpec),
}

impl TemplateBootstrapper {
    pub fn new(kind: TemplateKind, spec: TemplateSpec) -> Self {
        match kind {
            TemplateKind::Legacy => Self::Legacy(spec),
            TemplateKind::Composable => Self::Composable(spec),
        }
    }

    pub fn kind(&self) -> TemplateKind {
        match self {
            Self::Legacy(_) => TemplateKind::Legacy,
            Self::Composable(_) => TemplateKind::Composable,
        }
    }

    pub fn spec(&self) -> &TemplateSpec {
        match self {
            Self::Legacy(spec) | Self::Composable(spec) => spec,
        }
    }

    /// Body sent on creation
    pub fn body(&self) -> Value {
        let spec = self.spec();
        if let Some(body) = &spec.body {
            return body.clone();
        }

        let settings = default_settings();
        let mappings = default_mappings();
        match self {
            Self::Legacy(_) => json!({
                "index_patterns": [spec.index_pattern],
                "settings": settings,
                "mappings": mappings,
            }),
            Self::Composable(_) => json!({
                "index_patterns": [spec.index_pattern],
                "template": {
                    "settings": settings,
                    "mappings": mappings,
                },
            }),
        }
    }

    /// Create the template unless it already exists
    ///
    /// Creation is create-if-absent on the sink, so racing another writer
    /// between the check and the create is harmless.
    pub async fn ensure<C: SinkClient>(&self, client: &C) -> Result<TemplateOutcome, WriterError> {
        let kind = self.kind();
        let name = self.spec().name.as_str();

        let exists = client
            .template_exists(kind, name)
            .await
            .map_err(|e| bootstrap_error(name, e))?;

        if exists {
            tracing::debug!(template = name, kind = kind.as_str(), "template already present");
            return Ok(TemplateOutcome::AlreadyPresent);
        }

        client
            .template_upsert(kind, name, &self.body())
            .await
            .map_err(|e| bootstrap_error(name, e))?;

        tracing::info!(template = name, kind = kind.as_str(), "created template");
        Ok(TemplateOutcome::Created)
    }
}

fn bootstrap_error(name: &str, err: impl std::fmt::Display) -> WriterError {
    WriterError::TemplateBootstrap {
        name: name.to_string(),
        message: err.to_string(),
    }
}

fn default_settings() -> Value {
    json!({
        "number_of_shards": 1,
        "refresh_interval": "5s",
    })
}

fn default_mappings() -> Value {
    json!({
        "dynamic_templates": [{
            "strings_as_keywords": {
                "match_mapping_type": "string",
                "mapping": { "type": "keyword", "ignore_above": 1024 },
            },
        }],
        "properties": {
            "@timestamp": { "type": "date" },
            "message": { "type": "text" },
            "severity": { "type": "keyword" },
            "fields": { "type": "object", "dynamic": true },
        },
    })
}

#[cfg(test)]
#[path = "template_test.rs"]
mod template_test;
