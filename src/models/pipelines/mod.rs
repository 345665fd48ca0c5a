pub mod config;
pub mod pipeline;

pub use config::{PipelineConfig, StageConfig};
pub use pipeline::{Pipeline, PredicateError, Stage};
