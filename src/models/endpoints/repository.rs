use crate::config::config::ConfigError;
use crate::models::endpoints::config::RepositoryConfig;
use crate::models::endpoints::endpoint::{InvokeError, InvokeOptions, Invoker};
use crate::models::message::{headers, Body, Message};
use async_trait::async_trait;
use http::header::{ACCEPT, CONTENT_TYPE, LOCATION};
use http::Method;
use std::time::Duration;

const SPARQL_UPDATE: &str = "application/sparql-update";

/// Invoke endpoint for an HTTP resource repository.
///
/// The request URL is the base URL plus the message's `RESOURCE_ID` header,
/// the method comes from the stage override or the `HTTP_METHOD` header
/// (GET when neither is set).
pub struct RepositoryEndpoint {
    name: String,
    base_url: String,
    accept: Option<String>,
    throw_on_failure: bool,
    client: reqwest::Client,
}

impl RepositoryEndpoint {
    pub fn new(name: &str, config: &RepositoryConfig) -> Result<Self, ConfigError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout_ms) = config.timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }
        let client = builder.build().map_err(|e| ConfigError::InvalidEndpoint {
            name: name.to_string(),
            reason: format!("failed to build HTTP client: {}", e),
        })?;

        tracing::info!("Repository endpoint '{}' -> {}", name, config.base_url);
        Ok(Self {
            name: name.to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            accept: config.accept.clone(),
            throw_on_failure: config.throw_on_failure,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn resource_url(&self, message: &Message) -> Result<String, InvokeError> {
        let url = match message.header_str(headers::RESOURCE_ID) {
            Some(id) if !id.is_empty() => {
                if id.starts_with('/') {
                    format!("{}{}", self.base_url, id)
                } else {
                    format!("{}/{}", self.base_url, id)
                }
            }
            _ => self.base_url.clone(),
        };
        url::Url::parse(&url).map_err(|e| InvokeError::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        Ok(url)
    }
}

#[async_trait]
impl Invoker for RepositoryEndpoint {
    async fn invoke(&self, mut message: Message, options: &InvokeOptions) -> Result<Message, InvokeError> {
        let method_name = options
            .method
            .clone()
            .or_else(|| message.header_str(headers::HTTP_METHOD).map(str::to_string))
            .unwrap_or_else(|| "GET".to_string())
            .to_uppercase();
        let method = Method::from_bytes(method_name.as_bytes())
            .map_err(|_| InvokeError::InvalidMethod(method_name.clone()))?;
        let url = self.resource_url(&message)?;

        let mut request = self.client.request(method.clone(), &url);

        let accept = options
            .accept
            .as_deref()
            .or_else(|| message.header_str(headers::ACCEPT))
            .or(self.accept.as_deref());
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }

        let carries_body = matches!(method, Method::POST | Method::PUT | Method::PATCH);
        if carries_body && !message.body.is_empty() {
            let content_type = message
                .header_str(headers::CONTENT_TYPE)
                .map(str::to_string)
                .or_else(|| (method == Method::PATCH).then(|| SPARQL_UPDATE.to_string()));
            if let Some(content_type) = content_type {
                request = request.header(CONTENT_TYPE, content_type);
            }
            request = request.body(std::mem::take(&mut message.body).into_bytes());
        }

        tracing::debug!("Endpoint '{}': {} {}", self.name, method, url);
        let response = request.send().await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;

        let throw_on_failure = options.throw_on_failure.unwrap_or(self.throw_on_failure);
        if throw_on_failure && !(200..400).contains(&status) {
            tracing::warn!("Endpoint '{}': {} {} returned {}", self.name, method, url, status);
            return Err(InvokeError::FailedStatus {
                method: method.to_string(),
                url,
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        let mut reply = Message::with_headers(
            if bytes.is_empty() {
                Body::Empty
            } else {
                Body::Bytes(bytes.to_vec())
            },
            message.headers,
        );
        reply.set_header(headers::HTTP_RESPONSE_CODE, status);
        match content_type {
            Some(content_type) => reply.set_header(headers::CONTENT_TYPE, content_type),
            None => {
                reply.remove_header(headers::CONTENT_TYPE);
            }
        }
        if let Some(location) = location {
            reply.set_header(headers::LOCATION, location);
        }
        Ok(reply)
    }
}
