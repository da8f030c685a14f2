//! Command implementations

mod config;
mod fetch;
mod run;

use crate::cli::{Cli, Commands};
use crate::output::OutputWriter;
use anyhow::Result;
use tokio_util::sync::CancellationToken;

/// Execute a CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let output = OutputWriter::new(cli.json);
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Run(args) => run::execute(args, config_path, &output).await,
        Commands::Fetch(args) => fetch::execute(args, config_path, &output).await,
        Commands::Config(args) => config::execute(args, config_path, &output),
    }
}

/// Token cancelled on the first Ctrl-C
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling");
            token.cancel();
        }
    });
    cancel
}
