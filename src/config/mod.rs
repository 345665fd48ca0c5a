pub mod config;
pub mod logging_config;

pub use config::{Config, ConfigError, ExpectationConfig};
pub use logging_config::LoggingConfig;

use clap::Parser;
use std::path::PathBuf;

/// Command line arguments for the `courier` binary.
#[derive(Parser, Debug, PartialEq)]
#[command(
    name = "courier",
    about = "Submit one message to a configured pipeline"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    pub config: PathBuf,
    /// Pipeline receiving the submitted message
    pub pipeline: String,
    /// File whose bytes become the message body
    #[arg(short, long)]
    pub body: Option<PathBuf>,
    /// Message header as KEY=VALUE, repeatable
    #[arg(short = 'H', long = "header", value_parser = parse_key_value)]
    pub headers: Vec<(String, String)>,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("header '{}' is not KEY=VALUE", raw))
}
