pub mod config;
pub mod models;
pub mod pipeline;

use crate::config::{Cli, Config, LoggingConfig};
use crate::models::message::{Body, Headers};
use crate::pipeline::PipelineContext;
use anyhow::Context;
use serde_json::Value;
use std::sync::Arc;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Install the global tracing subscriber. `RUST_LOG` wins over the configured
/// level when set.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .with_context(|| format!("Invalid log level '{}'", config.log_level))?;

    let stdout = tracing_subscriber::fmt::layer()
        .with_file(true)
        .with_line_number(true);

    let file = if config.log_to_file {
        if let Some(parent) = std::path::Path::new(&config.log_file_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let log_file = std::fs::File::create(&config.log_file_path)
            .with_context(|| format!("Cannot create log file '{}'", config.log_file_path))?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .with_writer(Arc::new(log_file)),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout)
        .with(file)
        .try_init()
        .context("Failed to initialize logging")?;
    Ok(())
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::from_path(&cli.config)?;
    init_logging(&config.logging)?;

    tracing::info!("🔧 Starting courier with '{}'", cli.config.display());

    let context = PipelineContext::from_config(&config)?;

    let body = match &cli.body {
        Some(path) => Body::Bytes(
            tokio::fs::read(path)
                .await
                .with_context(|| format!("Cannot read body file '{}'", path.display()))?,
        ),
        None => Body::Empty,
    };
    let headers: Headers = cli
        .headers
        .iter()
        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
        .collect();

    let message = context.submit(&cli.pipeline, body, headers).await?;

    if let Some(code) = message.response_code() {
        println!("status: {}", code);
    }
    if let Some(content_type) = message.header_str(models::message::headers::CONTENT_TYPE) {
        println!("content-type: {}", content_type);
    }
    if let Some(text) = message.body.to_text() {
        println!("{}", text);
    }

    for capture in context.endpoints().captures() {
        tracing::info!("Capture '{}' holds {} messages", capture.name(), capture.count());
    }
    Ok(())
}
