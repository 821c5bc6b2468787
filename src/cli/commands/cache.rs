//! Cache command - manage cached balances

use super::balance_cache;
use crate::cli::args::{CacheAction, CacheArgs};
use crate::config::{Config, ConfigManager};
use crate::error::FintrackResult;
use crate::ui;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> FintrackResult<()> {
    match args.action {
        CacheAction::Path => show_path(config),
        CacheAction::Clear => clear(config).await?,
    }
    Ok(())
}

fn show_path(config: &Config) {
    if config.cache.persist {
        println!("{}", ConfigManager::cache_dir(config).display());
    } else {
        ui::step_info("cache.persist is off; balances are kept in memory only");
    }
}

async fn clear(config: &Config) -> FintrackResult<()> {
    balance_cache(config).await?.clear().await?;
    ui::step_ok_detail(
        "Cleared cached balances",
        &ConfigManager::cache_dir(config).display().to_string(),
    );
    Ok(())
}
