pub mod executor;


pub use executor::{PipelineContext, PipelineContextBuilder, PipelineError};
