//! Configuration validation
//!
//! Catches settings that parse but cannot work:
//! - zero intervals and capacities
//! - backoff profiles that shrink or never check
//! - unusable cluster URLs and conflicting credentials

use std::time::Duration;

use crate::Config;
use crate::error::{ConfigError, Result};
use crate::writer::ActiveShardsSetting;

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_elasticsearch(config)?;
    validate_writer(config)?;
    validate_template(config)?;
    validate_index(config)?;
    Ok(())
}

fn validate_elasticsearch(config: &Config) -> Result<()> {
    let es = &config.elasticsearch;

    if es.url.trim().is_empty() {
        return Err(ConfigError::missing_field("elasticsearch", "url"));
    }
    if !(es.url.starts_with("http://") || es.url.starts_with("https://")) {
        return Err(ConfigError::invalid_value(
            "elasticsearch",
            "url",
            format!("'{}' must start with http:// or https://", es.url),
        ));
    }
    if es.password.is_some() && es.username.is_none() {
        return Err(ConfigError::missing_field("elasticsearch", "username"));
    }
    if es.api_key.is_some() && es.username.is_some() {
        return Err(ConfigError::invalid_value(
            "elasticsearch",
            "api_key",
            "cannot be combined with username",
        ));
    }
    if es.request_timeout.is_zero() {
        return Err(ConfigError::invalid_value(
            "elasticsearch",
            "request_timeout",
            "must be greater than zero",
        ));
    }

    Ok(())
}

fn validate_writer(config: &Config) -> Result<()> {
    let writer = &config.writer;

    if writer.interval.is_zero() {
        return Err(ConfigError::invalid_value(
            "writer",
            "interval",
            "must be greater than zero",
        ));
    }
    if writer.buffer_limit == Some(0) {
        return Err(ConfigError::invalid_value(
            "writer",
            "buffer_limit",
            "must be greater than zero (omit it for an unbounded buffer)",
        ));
    }
    if let ActiveShardsSetting::Named(name) = &writer.wait_for_active_shards
        && name != "all"
    {
        return Err(ConfigError::invalid_value(
            "writer",
            "wait_for_active_shards",
            format!("expected a count or \"all\", got '{name}'"),
        ));
    }
    if writer.health_check.min_nodes == 0 {
        return Err(ConfigError::invalid_value(
            "writer.health_check",
            "min_nodes",
            "must be at least 1",
        ));
    }

    let startup = &writer.startup_backoff;
    validate_backoff(
        "writer.startup_backoff",
        startup.factor,
        startup.min_delay,
        startup.max_delay,
    )?;

    let reconnect = &writer.reconnect_backoff;
    validate_backoff(
        "writer.reconnect_backoff",
        reconnect.factor,
        reconnect.min_delay,
        reconnect.max_delay,
    )?;
    if reconnect.max_attempts == 0 {
        return Err(ConfigError::invalid_value(
            "writer.reconnect_backoff",
            "max_attempts",
            "must be at least 1",
        ));
    }

    Ok(())
}

fn validate_backoff(
    section: &'static str,
    factor: f64,
    min_delay: Duration,
    max_delay: Duration,
) -> Result<()> {
    if !factor.is_finite() || factor < 1.0 {
        return Err(ConfigError::invalid_value(
            section,
            "factor",
            format!("{factor} must be at least 1.0"),
        ));
    }
    if min_delay > max_delay {
        return Err(ConfigError::invalid_value(
            section,
            "min_delay",
            format!("{min_delay:?} exceeds max_delay {max_delay:?}"),
        ));
    }
    Ok(())
}

fn validate_template(config: &Config) -> Result<()> {
    if !config.template.enabled {
        return Ok(());
    }
    if let Some(name) = &config.template.name
        && name.trim().is_empty()
    {
        return Err(ConfigError::missing_field("template", "name"));
    }
    if config.template.name.is_none() && config.index.prefix.trim().is_empty() {
        return Err(ConfigError::missing_field("template", "name"));
    }
    Ok(())
}

fn validate_index(config: &Config) -> Result<()> {
    let index = &config.index;
    if let Some(name) = &index.name {
        if name.trim().is_empty() {
            return Err(ConfigError::missing_field("index", "name"));
        }
        return Ok(());
    }
    if index.prefix.trim().is_empty() {
        return Err(ConfigError::missing_field("index", "prefix"));
    }
    Ok(())
}
