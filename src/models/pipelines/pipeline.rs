use crate::models::endpoints::InvokeOptions;
use crate::models::message::Representation;
use courier_xpath::{Namespaces, Query, QueryError};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PredicateError {
    #[error("Query '{expression}' needs an XML body but found {found}; convert the body first")]
    Unconverted { expression: String, found: String },
    #[error("Malformed query: {0}")]
    Malformed(#[from] QueryError),
}

/// One pipeline operation. Stages are plain values; a pipeline is an ordered
/// list of them.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Send the message to an invoke endpoint and continue with the response.
    Invoke {
        endpoint: String,
        options: InvokeOptions,
    },
    SetHeader {
        key: String,
        value: Value,
    },
    RemoveHeader(String),
    ConvertBody(Representation),
    /// Drop the message unless the query matches its document body.
    Filter(Query),
    /// Continue once per matched node instead of with the message itself.
    Split(Query),
    /// Hand a copy to a capture endpoint and carry on.
    Capture(String),
    /// Run another pipeline and continue with the message it ends with.
    Forward(String),
}

impl Stage {
    pub fn invoke(endpoint: impl Into<String>) -> Self {
        Self::invoke_with(endpoint, InvokeOptions::default())
    }

    pub fn invoke_with(endpoint: impl Into<String>, options: InvokeOptions) -> Self {
        Stage::Invoke {
            endpoint: endpoint.into(),
            options,
        }
    }

    pub fn set_header(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Stage::SetHeader {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn remove_header(key: impl Into<String>) -> Self {
        Stage::RemoveHeader(key.into())
    }

    pub fn convert_body(target: Representation) -> Self {
        Stage::ConvertBody(target)
    }

    pub fn filter(xpath: &str, namespaces: &Namespaces) -> Result<Self, PredicateError> {
        Ok(Stage::Filter(Query::compile(xpath, namespaces)?))
    }

    pub fn split(xpath: &str, namespaces: &Namespaces) -> Result<Self, PredicateError> {
        Ok(Stage::Split(Query::compile(xpath, namespaces)?))
    }

    pub fn capture(endpoint: impl Into<String>) -> Self {
        Stage::Capture(endpoint.into())
    }

    pub fn forward(pipeline: impl Into<String>) -> Self {
        Stage::Forward(pipeline.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Stage::Invoke { .. } => "invoke",
            Stage::SetHeader { .. } => "set_header",
            Stage::RemoveHeader(_) => "remove_header",
            Stage::ConvertBody(_) => "convert_body",
            Stage::Filter(_) => "filter",
            Stage::Split(_) => "split",
            Stage::Capture(_) => "capture",
            Stage::Forward(_) => "forward",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    name: String,
    description: String,
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, stages: Vec<Stage>) -> Self {
        let name = name.into();
        Self {
            description: name.clone(),
            name,
            stages,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }
}
