use anyhow::Result;
use clap::{Parser, Subcommand};
use kinship_backend::cli;
use kinship_backend::config::KinshipConfig;
use kinship_backend::node::KinshipNode;
use kinship_backend::telemetry;
use kinship_backend::utils;

#[derive(Parser)]
#[command(author, version, about = "Kinship family-community backend daemon and CLI")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (Axum) for REST/API access
    Serve,
    /// Start the interactive console for polls, posts, and events
    Cli,
}

#[tokio::main]
async fn main() -> Result<()> {
    utils::print_banner();
    telemetry::init_tracing();

    let args = Args::parse();

    let config = KinshipConfig::from_env()?;
    let node = KinshipNode::start(config).await?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => node.run_http_server().await,
        Command::Cli => {
            let snapshot = node.snapshot();
            cli::run_cli(snapshot.config, snapshot.database, snapshot.hub).await
        }
    }
}
