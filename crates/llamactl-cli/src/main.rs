//! CLI entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use llamactl_cli::{Cli, Commands, bootstrap, handlers};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let ctx = bootstrap(&cli)?;

    match &cli.command {
        Commands::Serve { launch } => handlers::serve::execute(&ctx, launch).await,
        Commands::Tokenize { launch, text } => {
            handlers::tokenize::execute(&ctx, launch, text).await
        }
    }
}
