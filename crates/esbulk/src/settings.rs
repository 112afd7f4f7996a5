//! Map file configuration onto the runtime types of the client and writer

use anyhow::{Context, Result, bail};
use esbulk_config::{
    ActiveShardsSetting, ClusterStatus, Config, ReconnectBackoffConfig, StartupBackoffConfig,
    TemplateApi,
};
use esbulk_elastic::ElasticConfig;
use esbulk_writer::{
    ActiveShards, BackoffPolicy, HealthCheck, HealthStatus, TemplateConfig, TemplateKind,
    TemplateSpec, WriterConfig,
};

pub fn elastic_config(config: &Config) -> ElasticConfig {
    let es = &config.elasticsearch;
    let mut out = ElasticConfig::new(es.url.clone()).with_request_timeout(es.request_timeout);
    if let Some(username) = &es.username {
        out = out.with_basic_auth(username.clone(), es.password.clone());
    }
    if let Some(key) = &es.api_key {
        out = out.with_api_key(key.clone());
    }
    out
}

/// Build the writer configuration, loading the template body file if set
pub fn writer_config(config: &Config) -> Result<WriterConfig> {
    let section = &config.writer;

    let mut out = WriterConfig::default()
        .with_interval(section.interval)
        .with_retry_limit(section.retry_limit)
        .with_buffering(section.buffering)
        .with_wait_for_active_shards(Some(active_shards(&section.wait_for_active_shards)?))
        .with_health_check(HealthCheck {
            timeout: section.health_check.timeout,
            min_nodes: section.health_check.min_nodes,
            min_status: health_status(section.health_check.min_status),
        })
        .with_startup_backoff(startup_policy(&section.startup_backoff))
        .with_reconnect_backoff(reconnect_policy(&section.reconnect_backoff));

    if let Some(limit) = section.buffer_limit {
        out = out.with_buffer_limit(limit);
    }
    if let Some(pipeline) = &section.pipeline {
        out = out.with_pipeline(pipeline.clone());
    }
    if config.template.enabled {
        out = out.with_template(template_config(config)?);
    }

    Ok(out)
}

fn template_config(config: &Config) -> Result<TemplateConfig> {
    let mut spec = TemplateSpec::for_prefix(&config.index.prefix).with_name(config.template_name());

    if let Some(raw) = config.template_body()? {
        let body = serde_json::from_str(&raw).with_context(|| {
            format!(
                "template body '{}' is not valid JSON",
                config.template.body_file.as_deref().unwrap_or_default()
            )
        })?;
        spec = spec.with_body(body);
    }

    let kind = match config.template.kind {
        TemplateApi::Legacy => TemplateKind::Legacy,
        TemplateApi::Composable => TemplateKind::Composable,
    };
    Ok(TemplateConfig::new(kind, spec))
}

fn active_shards(setting: &ActiveShardsSetting) -> Result<ActiveShards> {
    match setting {
        ActiveShardsSetting::Count(n) => Ok(ActiveShards::Count(*n)),
        ActiveShardsSetting::Named(name) if name == "all" => Ok(ActiveShards::All),
        ActiveShardsSetting::Named(name) => bail!("unsupported wait_for_active_shards '{name}'"),
    }
}

fn health_status(status: ClusterStatus) -> HealthStatus {
    match status {
        ClusterStatus::Green => HealthStatus::Green,
        ClusterStatus::Yellow => HealthStatus::Yellow,
        ClusterStatus::Red => HealthStatus::Red,
    }
}

fn startup_policy(profile: &StartupBackoffConfig) -> BackoffPolicy {
    BackoffPolicy::unbounded(profile.factor, profile.min_delay, profile.max_delay)
}

fn reconnect_policy(profile: &ReconnectBackoffConfig) -> BackoffPolicy {
    BackoffPolicy::bounded(
        profile.max_attempts,
        profile.factor,
        profile.min_delay,
        profile.max_delay,
    )
}
