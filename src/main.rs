mod cli;
mod collections;
mod environment;
mod history;
mod http;
mod runner;
mod scripting;
mod storage;
mod validation;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();

    let cli = cli::Cli::parse();
    let exit_code = cli::execute(cli).await?;
    std::process::exit(exit_code);
}
