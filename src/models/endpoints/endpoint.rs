use crate::config::config::{ConfigError, ExpectationConfig};
use crate::models::endpoints::capture::CaptureEndpoint;
use crate::models::endpoints::config::EndpointConfig;
use crate::models::endpoints::expectation::ExpectationError;
use crate::models::endpoints::repository::RepositoryEndpoint;
use crate::models::message::Message;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("{method} {url} failed with status {status}")]
    FailedStatus {
        method: String,
        url: String,
        status: u16,
        body: String,
    },
    #[error("Invalid HTTP method '{0}'")]
    InvalidMethod(String),
    #[error("Invalid resource URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Per-stage overrides for an invoke endpoint's defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvokeOptions {
    pub method: Option<String>,
    pub accept: Option<String>,
    pub throw_on_failure: Option<bool>,
}

impl InvokeOptions {
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn throw_on_failure(mut self, throw: bool) -> Self {
        self.throw_on_failure = Some(throw);
        self
    }
}

/// An active endpoint: turns a message into a request and the response into
/// a new message.
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(&self, message: Message, options: &InvokeOptions) -> Result<Message, InvokeError>;
}

#[derive(Clone)]
pub enum Endpoint {
    Invoke(Arc<dyn Invoker>),
    Capture(Arc<CaptureEndpoint>),
}

impl Endpoint {
    pub fn kind(&self) -> &'static str {
        match self {
            Endpoint::Invoke(_) => "invoke",
            Endpoint::Capture(_) => "capture",
        }
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Invoke(_) => f.debug_tuple("Invoke").field(&"<dyn Invoker>").finish(),
            Endpoint::Capture(capture) => f.debug_tuple("Capture").field(&capture.name()).finish(),
        }
    }
}

/// Named endpoints owned by one pipeline context.
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    endpoints: HashMap<String, Endpoint>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(
        endpoints: &HashMap<String, EndpointConfig>,
        expectations: &ExpectationConfig,
    ) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for (name, config) in endpoints {
            config.validate(name)?;
            let endpoint = match config {
                EndpointConfig::Http(repository) => {
                    Endpoint::Invoke(Arc::new(RepositoryEndpoint::new(name, repository)?))
                }
                EndpointConfig::Capture(capture) => {
                    let mut timing = *expectations;
                    if let Some(timeout_ms) = capture.timeout_ms {
                        timing.timeout_ms = timeout_ms;
                    }
                    Endpoint::Capture(Arc::new(CaptureEndpoint::with_timing(name, timing)))
                }
            };
            registry.insert(name, endpoint)?;
        }
        tracing::debug!("Registered {} endpoints", registry.endpoints.len());
        Ok(registry)
    }

    pub fn insert(&mut self, name: &str, endpoint: Endpoint) -> Result<(), ConfigError> {
        if self.endpoints.contains_key(name) {
            return Err(ConfigError::Duplicate {
                kind: "endpoint",
                name: name.to_string(),
            });
        }
        self.endpoints.insert(name.to_string(), endpoint);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints.get(name)
    }

    pub fn invoker(&self, name: &str) -> Option<Arc<dyn Invoker>> {
        match self.endpoints.get(name) {
            Some(Endpoint::Invoke(invoker)) => Some(Arc::clone(invoker)),
            _ => None,
        }
    }

    pub fn capture(&self, name: &str) -> Option<Arc<CaptureEndpoint>> {
        match self.endpoints.get(name) {
            Some(Endpoint::Capture(capture)) => Some(Arc::clone(capture)),
            _ => None,
        }
    }

    pub fn captures(&self) -> impl Iterator<Item = &Arc<CaptureEndpoint>> {
        self.endpoints.values().filter_map(|endpoint| match endpoint {
            Endpoint::Capture(capture) => Some(capture),
            Endpoint::Invoke(_) => None,
        })
    }

    /// Wait for every capture endpoint's expectations, each with its own
    /// configured timeout.
    pub async fn assert_all_satisfied(&self) -> Result<(), ExpectationError> {
        for capture in self.captures() {
            capture.assert_satisfied().await?;
        }
        Ok(())
    }

    /// Wait for every capture endpoint's expectations under one overall
    /// deadline.
    pub async fn assert_all_satisfied_within(&self, timeout: Duration) -> Result<(), ExpectationError> {
        let deadline = Instant::now() + timeout;
        for capture in self.captures() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            capture.assert_satisfied_within(remaining).await?;
        }
        Ok(())
    }
}
