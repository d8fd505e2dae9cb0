mod cache;
mod cmd;
mod config;
mod context;
mod domain;
mod error;
mod infra;
mod services;
#[cfg(test)]
mod testing;
mod workflow;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cmd::cache::{self as cache_cmd, CacheArgs};
use crate::cmd::config::{self as config_cmd, ConfigArgs};
use crate::cmd::generate::{self, GenerateArgs};
use crate::config::AppConfig;
use crate::error::AppResult;

#[derive(Parser)]
#[command(
    name = "relnotes",
    author,
    version,
    about = "Rewrite GitHub release notes with AI summaries"
)]
struct Cli {
    /// Config file to use instead of ~/.relnotes/config.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate curated notes for a release and print them.
    Generate(GenerateArgs),
    /// Inspect the CLI configuration.
    Config(ConfigArgs),
    /// Maintain the summary cache.
    Cache(CacheArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(error) = run(cli).await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "relnotes=debug" } else { "relnotes=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> AppResult<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Config(args) => config_cmd::run(args.command, config_path),
        Commands::Cache(args) => {
            let config = AppConfig::load(config_path)?;
            cache_cmd::run(args.command, &config)
        }
        Commands::Generate(args) => {
            let config = AppConfig::load(config_path)?;
            generate::run(config, args).await
        }
    }
}
