use crate::models::message::body::{Body, ConversionError, Representation};
use serde_json::Value;
use std::collections::HashMap;

pub type Headers = HashMap<String, Value>;

/// Conventional header keys.
pub mod headers {
    pub const HTTP_METHOD: &str = "HTTP_METHOD";
    pub const CONTENT_TYPE: &str = "CONTENT_TYPE";
    pub const ACCEPT: &str = "ACCEPT";
    /// Numeric status, set only by invoke stages.
    pub const HTTP_RESPONSE_CODE: &str = "HTTP_RESPONSE_CODE";
    /// Path of a previously created resource, relative to the endpoint base URL.
    pub const RESOURCE_ID: &str = "RESOURCE_ID";
    pub const LOCATION: &str = "LOCATION";
}

/// The unit of work flowing through a pipeline.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    pub body: Body,
    pub headers: Headers,
}

impl Message {
    pub fn new(body: impl Into<Body>) -> Self {
        Self {
            body: body.into(),
            headers: Headers::new(),
        }
    }

    pub fn with_headers(body: impl Into<Body>, headers: Headers) -> Self {
        Self {
            body: body.into(),
            headers,
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_header(key, value);
        self
    }

    pub fn header(&self, key: &str) -> Option<&Value> {
        self.headers.get(key)
    }

    pub fn header_str(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(Value::as_str)
    }

    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.headers.insert(key.into(), value.into());
    }

    pub fn remove_header(&mut self, key: &str) -> Option<Value> {
        self.headers.remove(key)
    }

    pub fn response_code(&self) -> Option<u16> {
        self.header(headers::HTTP_RESPONSE_CODE)
            .and_then(Value::as_u64)
            .and_then(|code| u16::try_from(code).ok())
    }

    pub fn convert_body(&mut self, target: Representation) -> Result<(), ConversionError> {
        let body = std::mem::take(&mut self.body);
        self.body = body.convert(target)?;
        Ok(())
    }
}
