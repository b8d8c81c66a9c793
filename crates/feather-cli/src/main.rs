//! `feather-verify`: verify Feather tokens from the command line

use std::process::ExitCode;

use clap::Parser;
use tracing::debug;

mod cli;
mod commands;

use cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    cli.init_tracing();

    match run(cli).await {
        Ok(output) => {
            println!("{output:#}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("{:#}", commands::error_document(&error));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<serde_json::Value> {
    let config = cli.load_config()?;
    debug!(host = %config.host, port = config.port, protocol = %config.protocol, "Loaded configuration");
    cli.command.execute(config).await
}
