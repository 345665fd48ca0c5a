pub mod body;
pub mod message;


pub use body::{Body, ConversionError, Representation};
pub use message::{headers, Headers, Message};
