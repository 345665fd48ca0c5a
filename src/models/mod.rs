pub mod endpoints;
pub mod message;
pub mod pipelines;
