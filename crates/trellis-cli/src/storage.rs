use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use color_eyre::Result;
use dirs::data_dir;
use tracing::debug;
use trellis_storage::{DriverSet, EnhancedStorage, StorageFactory};

/// Resolve the default data directory for Trellis.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("trellis"))
}

/// Data directory from config, or the platform default.
pub fn data_root(config: &Config) -> Result<PathBuf> {
    match &config.data_dir {
        Some(root) => Ok(root.clone()),
        None => default_data_dir(),
    }
}

/// Build a factory rooted at the configured data dir with every configured
/// store registered.
pub fn factory_from_config(config: &Config) -> Result<StorageFactory> {
    let root = data_root(config)?;
    debug!(?root, "opening storage factory");
    register(factory_at(&root), config)
}

pub fn factory_at(root: &Path) -> StorageFactory {
    StorageFactory::new(DriverSet::with_data_dir(root))
}

fn register(factory: StorageFactory, config: &Config) -> Result<StorageFactory> {
    for store in config.store_configs() {
        factory.create(store)?;
    }
    Ok(factory)
}

/// Look up a registered store and wait for its initialization.
pub async fn open_store(factory: &StorageFactory, name: &str) -> Result<Arc<EnhancedStorage>> {
    let store = factory.require(name)?;
    store.initialize().await?;
    Ok(store)
}

/// Factory over a temp root with the given config's stores registered.
#[cfg(test)]
pub fn test_factory(root: &Path, config: &Config) -> StorageFactory {
    register(factory_at(root), config).expect("register stores")
}
