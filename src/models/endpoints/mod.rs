pub mod capture;
pub mod config;
pub mod endpoint;
pub mod expectation;
pub mod repository;

pub use capture::CaptureEndpoint;
pub use endpoint::{Endpoint, EndpointRegistry, InvokeError, InvokeOptions, Invoker};
pub use expectation::{Expectation, ExpectationError, UnmetExpectation};
pub use repository::RepositoryEndpoint;
