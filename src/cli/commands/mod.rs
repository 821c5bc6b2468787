//! CLI command implementations

pub mod balance;
pub mod cache;
pub mod config;
pub mod request;
pub mod session;

pub use balance::execute as balance;
pub use cache::execute as cache;
pub use config::execute as config;
pub use request::execute as request;
pub use session::execute as session;

use crate::cache::{BalanceCache, DurableStore, FileStore, MemoryStore};
use crate::config::{Config, ConfigManager};
use crate::error::FintrackResult;
use crate::session::{LogNavigator, SessionClient};
use std::sync::Arc;

/// Session client for one CLI invocation
fn session_client(config: &Config) -> SessionClient {
    SessionClient::from_config(config, Arc::new(LogNavigator))
}

/// Durable store selected by `cache.persist`
async fn durable_store(config: &Config) -> FintrackResult<Arc<dyn DurableStore>> {
    if config.cache.persist {
        let store = FileStore::open(ConfigManager::cache_dir(config)).await?;
        Ok(Arc::new(store))
    } else {
        Ok(Arc::new(MemoryStore::new()))
    }
}

/// Balance cache over the configured store
async fn balance_cache(config: &Config) -> FintrackResult<BalanceCache> {
    let store = durable_store(config).await?;
    Ok(BalanceCache::new(session_client(config), store))
}
