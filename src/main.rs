//! narkeep - maintain Nix NAR binary caches
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use narkeep::cli::{Cli, Commands};
use narkeep::config::ConfigManager;
use narkeep::error::NarkeepResult;
use narkeep::store::local::NarStore;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> NarkeepResult<()> {
    let cli = Cli::parse();

    // Initialize logging: 0 = warn, 1 = info, 2+ = debug. Results go to
    // stdout, diagnostics to stderr, so output stays pipeable.
    let filter = match cli.verbose {
        0 => EnvFilter::new("narkeep=warn"),
        1 => EnvFilter::new("narkeep=info"),
        _ => EnvFilter::new("narkeep=debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };
    let config = config_manager.load().await?;

    let store = NarStore::open(cli.store.clone())?;

    // Dispatch to command
    match cli.command {
        Commands::Check(args) => narkeep::cli::commands::check(&store, args).await,
        Commands::Get(args) => narkeep::cli::commands::get(&store, args).await,
        Commands::Drvs(args) => narkeep::cli::commands::drvs(&store, args).await,
        Commands::Orphans(args) => narkeep::cli::commands::orphans(&store, args, &config).await,
        Commands::Cache(args) => narkeep::cli::commands::cache(&store, args, &config).await,
        Commands::Fetch(args) => narkeep::cli::commands::fetch(&store, args, &config).await,
        Commands::Compress(args) => {
            narkeep::cli::commands::compress(&store, args, &config).await
        }
        Commands::Nixcopy(args) => {
            narkeep::cli::commands::nixcopy(&store, args, &config).await
        }
    }
}
