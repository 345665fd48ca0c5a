use clap::Parser;
use courier::config::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    courier::run(cli).await
}
