//! Turn input lines into documents and pick their index

use std::fmt::Write;

use anyhow::{Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use esbulk_config::IndexConfig;
use serde_json::{Map, Value, json};

/// Document for one input line
///
/// JSON objects pass through with `@timestamp` filled in when missing.
/// Anything else is wrapped as an `info` message.
pub fn shape_record(line: &str, now: DateTime<Utc>) -> Value {
    let timestamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);

    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(mut doc)) => {
            doc.entry("@timestamp").or_insert(Value::String(timestamp));
            Value::Object(doc)
        }
        _ => json!({
            "@timestamp": timestamp,
            "message": line,
            "severity": "info",
            "fields": Value::Object(Map::new()),
        }),
    }
}

/// Target index at `now`: the fixed name, else `<prefix>-<date>`
///
/// # Errors
///
/// Fails when `suffix_pattern` is not a valid strftime pattern.
pub fn index_name(config: &IndexConfig, now: DateTime<Utc>) -> Result<String> {
    if let Some(name) = &config.name {
        return Ok(name.clone());
    }

    let mut out = format!("{}-", config.prefix);
    write!(out, "{}", now.format(&config.suffix_pattern))
        .map_err(|_| anyhow!("invalid index suffix pattern '{}'", config.suffix_pattern))?;
    Ok(out)
}
