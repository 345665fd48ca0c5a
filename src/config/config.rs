use crate::config::logging_config::LoggingConfig;
use crate::models::endpoints::config::EndpointConfig;
use crate::models::pipelines::config::PipelineConfig;
use courier_xpath::Namespaces;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid endpoint '{name}': {reason}")]
    InvalidEndpoint { name: String, reason: String },
    #[error("Invalid pipeline '{name}': {reason}")]
    InvalidPipeline { name: String, reason: String },
    #[error("Duplicate {kind} '{name}'")]
    Duplicate { kind: &'static str, name: String },
    #[error("Invalid expectation settings: {0}")]
    InvalidExpectations(String),
}

/// Timing for `assert_satisfied` waits on capture endpoints.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct ExpectationConfig {
    pub timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for ExpectationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            poll_interval_ms: 50,
        }
    }
}

impl ExpectationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidExpectations(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub expectations: ExpectationConfig,
    /// Prefix bindings for filter and split queries.
    pub namespaces: BTreeMap<String, String>,
    pub endpoints: HashMap<String, EndpointConfig>,
    pub pipelines: HashMap<String, PipelineConfig>,
}

impl Config {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&text)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks each section on its own. Cross references between pipelines
    /// and endpoints are checked when the pipeline context is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.expectations.validate()?;

        for (name, endpoint) in &self.endpoints {
            endpoint.validate(name)?;
        }

        for (name, pipeline) in &self.pipelines {
            if pipeline.stages.is_empty() {
                return Err(ConfigError::InvalidPipeline {
                    name: name.clone(),
                    reason: "a pipeline needs at least one stage".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn namespaces(&self) -> Namespaces {
        self.namespaces.iter().collect()
    }
}
