use crate::config::config::{Config, ConfigError};
use crate::models::endpoints::{
    CaptureEndpoint, Endpoint, EndpointRegistry, ExpectationError, InvokeError, Invoker,
};
use crate::models::message::{Body, ConversionError, Headers, Message};
use crate::models::pipelines::{Pipeline, PredicateError, Stage};
use futures_util::future::{BoxFuture, FutureExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Unknown pipeline '{0}'")]
    UnknownPipeline(String),
    #[error("Unknown {kind} endpoint '{name}'")]
    UnknownEndpoint { name: String, kind: &'static str },
    #[error("Body conversion failed: {0}")]
    Conversion(#[from] ConversionError),
    #[error("Predicate evaluation failed: {0}")]
    Predicate(#[from] PredicateError),
    #[error("Invoke failed: {0}")]
    Invoke(#[from] InvokeError),
}

/// Pipelines and the endpoints they reference, scoped to one run.
///
/// Each submission owns its messages; the only state shared between
/// concurrent submissions is the capture log of each capture endpoint.
#[derive(Debug)]
pub struct PipelineContext {
    pipelines: HashMap<String, Pipeline>,
    endpoints: EndpointRegistry,
}

impl PipelineContext {
    pub fn builder() -> PipelineContextBuilder {
        PipelineContextBuilder::default()
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let namespaces = config.namespaces();
        let endpoints = EndpointRegistry::from_config(&config.endpoints, &config.expectations)?;
        let pipelines = config
            .pipelines
            .iter()
            .map(|(name, pipeline)| pipeline.build(name, &namespaces))
            .collect::<Result<Vec<_>, _>>()?;
        Self::assemble(pipelines, endpoints)
    }

    fn assemble(pipelines: Vec<Pipeline>, endpoints: EndpointRegistry) -> Result<Self, ConfigError> {
        let mut by_name = HashMap::new();
        for pipeline in pipelines {
            let name = pipeline.name().to_string();
            if by_name.insert(name.clone(), pipeline).is_some() {
                return Err(ConfigError::Duplicate {
                    kind: "pipeline",
                    name,
                });
            }
        }
        let context = Self {
            pipelines: by_name,
            endpoints,
        };
        context.validate()?;
        tracing::info!(
            "Pipeline context ready with {} pipelines",
            context.pipelines.len()
        );
        Ok(context)
    }

    /// Every endpoint and pipeline a stage names must exist with the right
    /// capability, and forwards must not loop.
    fn validate(&self) -> Result<(), ConfigError> {
        for pipeline in self.pipelines.values() {
            for (index, stage) in pipeline.stages().iter().enumerate() {
                let invalid = |reason: String| ConfigError::InvalidPipeline {
                    name: pipeline.name().to_string(),
                    reason: format!("stage {} ({}): {}", index, stage.kind(), reason),
                };
                match stage {
                    Stage::Invoke { endpoint, .. } => match self.endpoints.get(endpoint) {
                        Some(Endpoint::Invoke(_)) => {}
                        Some(other) => {
                            return Err(invalid(format!(
                                "endpoint '{}' is a {} endpoint",
                                endpoint,
                                other.kind()
                            )))
                        }
                        None => return Err(invalid(format!("unknown endpoint '{}'", endpoint))),
                    },
                    Stage::Capture(endpoint) => match self.endpoints.get(endpoint) {
                        Some(Endpoint::Capture(_)) => {}
                        Some(other) => {
                            return Err(invalid(format!(
                                "endpoint '{}' is an {} endpoint",
                                endpoint,
                                other.kind()
                            )))
                        }
                        None => return Err(invalid(format!("unknown endpoint '{}'", endpoint))),
                    },
                    Stage::Forward(target) if !self.pipelines.contains_key(target) => {
                        return Err(invalid(format!("unknown pipeline '{}'", target)));
                    }
                    _ => {}
                }
            }
        }

        for name in self.pipelines.keys() {
            self.check_forward_cycle(name, &mut Vec::new(), &mut HashSet::new())?;
        }
        Ok(())
    }

    fn check_forward_cycle<'a>(
        &'a self,
        name: &'a str,
        path: &mut Vec<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> Result<(), ConfigError> {
        if done.contains(name) {
            return Ok(());
        }
        if path.contains(&name) {
            path.push(name);
            return Err(ConfigError::InvalidPipeline {
                name: path[0].to_string(),
                reason: format!("forward cycle {}", path.join(" -> ")),
            });
        }
        path.push(name);
        if let Some(pipeline) = self.pipelines.get(name) {
            for stage in pipeline.stages() {
                if let Stage::Forward(target) = stage {
                    self.check_forward_cycle(target, path, done)?;
                }
            }
        }
        path.pop();
        done.insert(name);
        Ok(())
    }

    pub fn pipeline(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.get(name)
    }

    pub fn endpoints(&self) -> &EndpointRegistry {
        &self.endpoints
    }

    pub fn capture(&self, name: &str) -> Option<Arc<CaptureEndpoint>> {
        self.endpoints.capture(name)
    }

    pub async fn assert_all_satisfied(&self) -> Result<(), ExpectationError> {
        self.endpoints.assert_all_satisfied().await
    }

    /// Run a new message through `pipeline` and return it as it left the
    /// pipeline: the final response, the message a filter dropped, or the
    /// original message of a split.
    #[tracing::instrument(skip(self, body, headers))]
    pub async fn submit(
        &self,
        pipeline: &str,
        body: impl Into<Body> + Send,
        headers: Headers,
    ) -> Result<Message, PipelineError> {
        self.submit_message(pipeline, Message::with_headers(body, headers))
            .await
    }

    pub async fn submit_message(&self, pipeline: &str, message: Message) -> Result<Message, PipelineError> {
        let target = self
            .pipelines
            .get(pipeline)
            .ok_or_else(|| PipelineError::UnknownPipeline(pipeline.to_string()))?;

        tracing::info!("Submitting message to pipeline '{}'", target.description());
        let result = self.run(target, 0, message).await;
        match &result {
            Ok(_) => tracing::info!("Pipeline '{}' completed", pipeline),
            Err(e) => tracing::warn!("Pipeline '{}' aborted: {}", pipeline, e),
        }
        result
    }

    fn run<'a>(
        &'a self,
        pipeline: &'a Pipeline,
        start: usize,
        mut message: Message,
    ) -> BoxFuture<'a, Result<Message, PipelineError>> {
        async move {
            for (index, stage) in pipeline.stages().iter().enumerate().skip(start) {
                tracing::debug!("{}[{}] {}", pipeline.name(), index, stage.kind());
                match stage {
                    Stage::Invoke { endpoint, options } => {
                        let invoker = self.invoker(endpoint)?;
                        message = invoker.invoke(message, options).await?;
                    }
                    Stage::SetHeader { key, value } => message.set_header(key.clone(), value.clone()),
                    Stage::RemoveHeader(key) => {
                        message.remove_header(key);
                    }
                    Stage::ConvertBody(target) => message.convert_body(*target)?,
                    Stage::Filter(query) => {
                        if !query.matches(document(&message, query)?) {
                            tracing::debug!(
                                "{}[{}] filter '{}' did not match, dropping message",
                                pipeline.name(),
                                index,
                                query.expression()
                            );
                            return Ok(message);
                        }
                    }
                    Stage::Split(query) => {
                        let parts: Vec<Message> = query
                            .select(document(&message, query)?)
                            .iter()
                            .map(|node| Message::with_headers(node.serialize(), message.headers.clone()))
                            .collect();
                        tracing::debug!(
                            "{}[{}] split '{}' produced {} messages",
                            pipeline.name(),
                            index,
                            query.expression(),
                            parts.len()
                        );
                        for part in parts {
                            self.run(pipeline, index + 1, part).await?;
                        }
                        return Ok(message);
                    }
                    Stage::Capture(name) => {
                        let capture = self.endpoints.capture(name).ok_or_else(|| {
                            PipelineError::UnknownEndpoint {
                                name: name.clone(),
                                kind: "capture",
                            }
                        })?;
                        capture.receive(message.clone());
                    }
                    Stage::Forward(name) => {
                        let target = self
                            .pipelines
                            .get(name)
                            .ok_or_else(|| PipelineError::UnknownPipeline(name.clone()))?;
                        message = self.run(target, 0, message).await?;
                    }
                }
            }
            Ok(message)
        }
        .boxed()
    }

    fn invoker(&self, name: &str) -> Result<Arc<dyn Invoker>, PipelineError> {
        self.endpoints
            .invoker(name)
            .ok_or_else(|| PipelineError::UnknownEndpoint {
                name: name.to_string(),
                kind: "invoke",
            })
    }
}

fn document<'m>(
    message: &'m Message,
    query: &courier_xpath::Query,
) -> Result<&'m courier_xpath::Document, PredicateError> {
    message.body.as_document().ok_or_else(|| PredicateError::Unconverted {
        expression: query.expression().to_string(),
        found: match message.body.representation() {
            Some(representation) => format!("{:?}", representation).to_lowercase(),
            None => "an empty body".to_string(),
        },
    })
}

/// Assembles a [`PipelineContext`] from values instead of a config file.
#[derive(Default)]
pub struct PipelineContextBuilder {
    pipelines: Vec<Pipeline>,
    endpoints: Vec<(String, Endpoint)>,
}

impl PipelineContextBuilder {
    pub fn pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipelines.push(pipeline);
        self
    }

    pub fn invoker(mut self, name: impl Into<String>, invoker: Arc<dyn Invoker>) -> Self {
        self.endpoints.push((name.into(), Endpoint::Invoke(invoker)));
        self
    }

    pub fn capture(self, name: impl Into<String>) -> Self {
        let name = name.into();
        let endpoint = CaptureEndpoint::new(name.clone());
        self.capture_endpoint(endpoint)
    }

    pub fn capture_endpoint(mut self, endpoint: CaptureEndpoint) -> Self {
        self.endpoints
            .push((endpoint.name().to_string(), Endpoint::Capture(Arc::new(endpoint))));
        self
    }

    pub fn build(self) -> Result<PipelineContext, ConfigError> {
        let mut registry = EndpointRegistry::new();
        for (name, endpoint) in self.endpoints {
            registry.insert(&name, endpoint)?;
        }
        PipelineContext::assemble(self.pipelines, registry)
    }
}
