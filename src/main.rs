use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use condosync::cli::args::{Cli, Commands};
use condosync::cli::commands::{self, Environment};
use condosync::error::SyncError;

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("condosync=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

async fn run() -> Result<(), SyncError> {
    let cli = Cli::parse();
    let format = cli.output;
    let env = Environment {
        offline: cli.offline,
        base_url: cli.base_url,
        api_key: cli.api_key,
    };

    let output = match cli.command {
        Commands::Queue(args) => commands::queue(&env, args.command, format)?,
        Commands::DeadLetter(args) => commands::dead_letter(&env, args.command, format)?,
        Commands::Write(args) => commands::write(&env, args.command, format).await?,
        Commands::Status => commands::status(&env, format).await?,
        Commands::Sync(args) => commands::sync(&env, args.command, format).await?,
    };

    if !output.is_empty() {
        println!("{output}");
    }

    Ok(())
}
