use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::{
    config::StorageConfig, enhanced::EnhancedStorage, error::StorageError,
    provider::DriverProvider,
};

/// Registry of storage instances keyed by config name.
///
/// `create` is idempotent per name: the first config wins and later configs
/// for the same name are ignored.
pub struct StorageFactory {
    provider: Arc<dyn DriverProvider>,
    stores: Mutex<Vec<Arc<EnhancedStorage>>>,
}

impl StorageFactory {
    pub fn new(provider: impl DriverProvider + 'static) -> Self {
        Self {
            provider: Arc::new(provider),
            stores: Mutex::new(Vec::new()),
        }
    }

    /// Create (or return the existing) instance for `config.name`.
    ///
    /// A fresh instance is initialized in the background when a tokio runtime
    /// is running; otherwise the caller drives `initialize()` itself.
    pub fn create(&self, config: StorageConfig) -> Result<Arc<EnhancedStorage>, StorageError> {
        let mut stores = self.stores.lock();
        if let Some(existing) = stores.iter().find(|s| s.name() == config.name) {
            warn!(
                "storage with name \"{}\" already exists; returning existing instance",
                config.name
            );
            return Ok(Arc::clone(existing));
        }

        let driver = self.provider.open(&config)?;
        let storage = Arc::new(EnhancedStorage::new(config, driver)?);
        stores.push(Arc::clone(&storage));
        drop(stores);

        info!(name = %storage.name(), "storage created");
        spawn_initialize(&storage);
        Ok(storage)
    }

    pub fn get_store(&self, name: &str) -> Option<Arc<EnhancedStorage>> {
        self.stores
            .lock()
            .iter()
            .find(|s| s.name() == name)
            .cloned()
    }

    /// Like [`StorageFactory::get_store`], but a missing store is an error.
    pub fn require(&self, name: &str) -> Result<Arc<EnhancedStorage>, StorageError> {
        self.get_store(name).ok_or_else(|| StorageError::UnknownStore {
            name: name.to_string(),
        })
    }

    /// Clear a store's data and unregister it.
    ///
    /// If clearing fails the store stays registered so the caller can retry.
    /// Unknown names are a no-op.
    pub async fn remove_store(&self, name: &str) -> Result<(), StorageError> {
        let Some(storage) = self.get_store(name) else {
            return Ok(());
        };

        if let Err(err) = storage.clear().await {
            error!(error = %err, "failed to remove storage \"{}\"", name);
            return Err(err);
        }

        self.stores
            .lock()
            .retain(|s| !Arc::ptr_eq(s, &storage));
        info!(name, "storage removed");
        Ok(())
    }

    /// Registered names in creation order.
    pub fn list_stores(&self) -> Vec<String> {
        self.stores
            .lock()
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }
}

fn spawn_initialize(storage: &Arc<EnhancedStorage>) {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        return;
    };
    let storage = Arc::clone(storage);
    handle.spawn(async move {
        // Failures are already logged by initialize; nothing else to do here.
        let _ = storage.initialize().await;
    });
}
