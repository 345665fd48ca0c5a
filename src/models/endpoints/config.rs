use crate::config::config::ConfigError;
use serde::Deserialize;

/// An `[endpoints.<name>]` table. The `type` key selects the capability.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EndpointConfig {
    Http(RepositoryConfig),
    Capture(CaptureConfig),
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RepositoryConfig {
    pub base_url: String,
    /// Sent as `Accept` unless the stage or message overrides it.
    #[serde(default = "default_accept")]
    pub accept: Option<String>,
    #[serde(default = "default_throw_on_failure")]
    pub throw_on_failure: bool,
    /// Transport timeout. Unset means whatever the HTTP client defaults to.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl RepositoryConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            accept: default_accept(),
            throw_on_failure: default_throw_on_failure(),
            timeout_ms: None,
        }
    }
}

fn default_accept() -> Option<String> {
    Some("application/rdf+xml".to_string())
}

fn default_throw_on_failure() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct CaptureConfig {
    /// Overrides `[expectations] timeout_ms` for this endpoint.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl EndpointConfig {
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        match self {
            EndpointConfig::Http(repository) => {
                let parsed = url::Url::parse(&repository.base_url).map_err(|e| {
                    ConfigError::InvalidEndpoint {
                        name: name.to_string(),
                        reason: format!("invalid base_url '{}': {}", repository.base_url, e),
                    }
                })?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(ConfigError::InvalidEndpoint {
                        name: name.to_string(),
                        reason: format!("unsupported scheme '{}'", parsed.scheme()),
                    });
                }
                if repository.timeout_ms == Some(0) {
                    return Err(ConfigError::InvalidEndpoint {
                        name: name.to_string(),
                        reason: "timeout_ms must be greater than zero".to_string(),
                    });
                }
                Ok(())
            }
            EndpointConfig::Capture(_) => Ok(()),
        }
    }
}
