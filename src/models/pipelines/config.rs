use crate::config::config::ConfigError;
use crate::models::endpoints::InvokeOptions;
use crate::models::message::Representation;
use crate::models::pipelines::pipeline::{Pipeline, Stage};
use courier_xpath::{Namespaces, Query};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PipelineConfig {
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

fn default_description() -> String {
    "Unnamed pipeline".to_string()
}

/// Serialized form of a [`Stage`]; queries are compiled when the pipeline is
/// built.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageConfig {
    Invoke {
        endpoint: String,
        #[serde(default)]
        method: Option<String>,
        #[serde(default)]
        accept: Option<String>,
        #[serde(default)]
        throw_on_failure: Option<bool>,
    },
    SetHeader {
        key: String,
        value: Value,
    },
    RemoveHeader {
        key: String,
    },
    ConvertBody {
        to: Representation,
    },
    Filter {
        xpath: String,
    },
    Split {
        xpath: String,
    },
    Capture {
        endpoint: String,
    },
    Forward {
        pipeline: String,
    },
}

impl PipelineConfig {
    pub fn build(&self, name: &str, namespaces: &Namespaces) -> Result<Pipeline, ConfigError> {
        let stages = self
            .stages
            .iter()
            .enumerate()
            .map(|(index, stage)| {
                stage.compile(namespaces).map_err(|e| ConfigError::InvalidPipeline {
                    name: name.to_string(),
                    reason: format!("stage {}: {}", index, e),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Pipeline::new(name, stages).with_description(self.description.clone()))
    }
}

impl StageConfig {
    pub fn compile(&self, namespaces: &Namespaces) -> Result<Stage, courier_xpath::QueryError> {
        let stage = match self {
            StageConfig::Invoke {
                endpoint,
                method,
                accept,
                throw_on_failure,
            } => Stage::invoke_with(
                endpoint.clone(),
                InvokeOptions {
                    method: method.clone(),
                    accept: accept.clone(),
                    throw_on_failure: *throw_on_failure,
                },
            ),
            StageConfig::SetHeader { key, value } => Stage::set_header(key.clone(), value.clone()),
            StageConfig::RemoveHeader { key } => Stage::remove_header(key.clone()),
            StageConfig::ConvertBody { to } => Stage::convert_body(*to),
            StageConfig::Filter { xpath } => Stage::Filter(Query::compile(xpath, namespaces)?),
            StageConfig::Split { xpath } => Stage::Split(Query::compile(xpath, namespaces)?),
            StageConfig::Capture { endpoint } => Stage::capture(endpoint.clone()),
            StageConfig::Forward { pipeline } => Stage::forward(pipeline.clone()),
        };
        Ok(stage)
    }
}
