//! esbulk Configuration
//!
//! TOML-based configuration loading with sensible defaults. An empty file
//! writes to `http://localhost:9200` with the default writer settings.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use esbulk_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[writer]\ninterval = \"5s\"").unwrap();
//! assert_eq!(config.writer.interval.as_secs(), 5);
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [elasticsearch]
//! url = "https://es.internal:9200"
//! api_key = "c2VjcmV0"
//!
//! [writer]
//! buffer_limit = 10000
//!
//! [index]
//! prefix = "app"
//! ```

mod elasticsearch;
mod error;
mod index;
mod logging;
mod template;
mod validation;
mod writer;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use elasticsearch::ElasticsearchConfig;
pub use error::{ConfigError, Result};
pub use index::IndexConfig;
pub use logging::{LogConfig, LogFormat, LogLevel, LogOutput};
pub use template::{TemplateApi, TemplateSection};
pub use writer::{
    ActiveShardsSetting, ClusterStatus, HealthCheckConfig, ReconnectBackoffConfig,
    StartupBackoffConfig, WriterSection,
};

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// Cluster connection
    pub elasticsearch: ElasticsearchConfig,

    /// Buffering, retries and health checks
    pub writer: WriterSection,

    /// Index template created on connect
    pub template: TemplateSection,

    /// Where records are written
    pub index: IndexConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, contains invalid TOML or fails
    /// validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Template name, `template_<prefix>` unless set explicitly
    pub fn template_name(&self) -> String {
        match &self.template.name {
            Some(name) => name.clone(),
            None => format!("template_{}", self.index.prefix),
        }
    }

    /// Raw contents of `template.body_file`, if one is configured
    ///
    /// # Errors
    ///
    /// Returns `IoError` when the file cannot be read.
    pub fn template_body(&self) -> Result<Option<String>> {
        let Some(path) = &self.template.body_file else {
            return Ok(None);
        };
        fs::read_to_string(path)
            .map(Some)
            .map_err(|e| ConfigError::IoError {
                path: path.clone(),
                source: e,
            })
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
