//! fintrack - personal finance API client
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use fintrack::cli::{Cli, Commands};
use fintrack::config::{Config, ConfigManager};
use fintrack::error::FintrackResult;
use std::process::ExitCode;
use tracing::debug;
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

async fn run() -> FintrackResult<()> {
    let cli = Cli::parse();

    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };

    let mut config = config_manager.load().await?;
    apply_overrides(&mut config, &cli);

    init_logging(cli.verbose, &config.general.log_format);
    debug!("Using config at {}", config_manager.path().display());

    match cli.command {
        Commands::Request(args) => fintrack::cli::commands::request(args, &config).await,
        Commands::Balance(args) => fintrack::cli::commands::balance(args, &config).await,
        Commands::Session(args) => fintrack::cli::commands::session(args, &config).await,
        Commands::Cache(args) => fintrack::cli::commands::cache(args, &config).await,
        Commands::Config(args) => {
            fintrack::cli::commands::config(args, &config, &config_manager).await
        }
    }
}

/// CLI flags and environment win over the config file
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(ref base) = cli.api_base {
        config.api.base_url = base.clone();
    }
    if let Some(ref base) = cli.auth_base {
        config.api.auth_base_url = base.clone();
    }
}

/// 0 = warn, 1 = info, 2+ = debug
fn init_logging(verbose: u8, log_format: &str) {
    let filter = match verbose {
        0 => EnvFilter::new("fintrack=warn"),
        1 => EnvFilter::new("fintrack=info"),
        _ => EnvFilter::new("fintrack=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
