mod cli;
mod client;
mod controller;
mod ipc;
mod wallpaper;

#[cfg(test)]
mod testing;

use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Daemon(args) => {
            if let Err(e) = controller::run(args.into_config()).await {
                tracing::error!(error = %e, "daemon failed");
                eprintln!("iowall daemon: {e}");
                std::process::exit(1);
            }
        }
        Command::Client { action } => {
            if let Err(e) = client::run(action).await {
                tracing::error!(error = %e, "client failed");
                eprintln!("iowall client: {e}");
                std::process::exit(1);
            }
        }
    }
}
