mod cli;
mod config;
mod migrate;
mod replace;
mod translate;
mod utils;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Translate(args) => translate::run(args)?,
        Commands::Replace(args) => replace::run(args)?,
        Commands::Migrate(args) => migrate::run(args)?,
        Commands::Config(args) => config::commands::run(args)?,
    }

    Ok(())
}
