//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// fintrack - personal finance API client
///
/// Talks to the fintrack API with automatic session refresh and a
/// persistent previous-month balance cache.
#[derive(Parser, Debug)]
#[command(name = "fintrack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "FINTRACK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override api.base_url
    #[arg(long, global = true, env = "FINTRACK_API_BASE")]
    pub api_base: Option<String>,

    /// Override api.auth_base_url
    #[arg(long, global = true, env = "FINTRACK_AUTH_BASE")]
    pub auth_base: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a request to the API
    Request(RequestArgs),

    /// Show the previous month's closing balance for a user
    Balance(BalanceArgs),

    /// Inspect or end the current session
    Session(SessionArgs),

    /// Manage the balance cache
    Cache(CacheArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the request command
#[derive(Parser, Debug)]
pub struct RequestArgs {
    /// HTTP method (GET, POST, PUT, PATCH, DELETE)
    pub method: String,

    /// Path relative to api.base_url, or an absolute URL
    pub path: String,

    /// Request body; sent as JSON when it parses as JSON
    #[arg(short, long)]
    pub data: Option<String>,

    /// Extra header (Name: value)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Query parameter (key=value)
    #[arg(short, long = "query", value_parser = parse_query)]
    pub query: Vec<(String, String)>,
}

/// Arguments for the balance command
#[derive(Parser, Debug)]
pub struct BalanceArgs {
    /// User whose balance to look up
    pub user_id: String,

    /// Drop cached values for this user before looking up
    #[arg(long)]
    pub refresh: bool,

    /// Output format
    #[arg(short, long, default_value = "plain")]
    pub format: OutputFormat,
}

/// Arguments for the session command
#[derive(Parser, Debug)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub action: SessionAction,
}

/// Session subcommands
#[derive(Subcommand, Debug)]
pub enum SessionAction {
    /// Show the signed-in user
    Me,

    /// Renew the session
    Refresh,

    /// End the session
    Logout,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show where cached balances are kept
    Path,

    /// Remove every cached balance
    Clear,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for balance lookups
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Plain,
    /// JSON output
    Json,
}

/// Parse a header in `Name: value` format
fn parse_header(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| format!("invalid header '{s}': expected 'Name: value'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("invalid header '{s}': empty name"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Parse a query parameter in `key=value` format
fn parse_query(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid key=value format: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}
