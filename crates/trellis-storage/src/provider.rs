use std::{path::PathBuf, sync::Arc};

use tracing::debug;
use trellis_core::{MemoryDriver, StorageDriver};

use crate::{
    config::{DriverKind, StorageConfig},
    error::StorageError,
    file_driver::FileDriver,
};

const DEFAULT_ORDER: [DriverKind; 2] = [DriverKind::File, DriverKind::Memory];

/// Opens the persistent driver for a new storage instance.
pub trait DriverProvider: Send + Sync {
    fn open(&self, config: &StorageConfig) -> Result<Arc<dyn StorageDriver>, StorageError>;
}

/// Walks the config's driver preference and opens the first kind available.
///
/// `File` is available only with a data directory; `Memory` always is.
#[derive(Debug, Clone, Default)]
pub struct DriverSet {
    data_dir: Option<PathBuf>,
}

impl DriverSet {
    /// Memory-only provider.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Provider that can also open file drivers under `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(data_dir.into()),
        }
    }

    fn try_open(&self, kind: DriverKind, config: &StorageConfig) -> Option<Arc<dyn StorageDriver>> {
        match kind {
            DriverKind::File => self.data_dir.as_ref().map(|dir| {
                Arc::new(FileDriver::namespaced(dir, &config.name, &config.store_name))
                    as Arc<dyn StorageDriver>
            }),
            DriverKind::Memory => Some(Arc::new(MemoryDriver::new()) as Arc<dyn StorageDriver>),
        }
    }
}

impl DriverProvider for DriverSet {
    fn open(&self, config: &StorageConfig) -> Result<Arc<dyn StorageDriver>, StorageError> {
        let order: &[DriverKind] = if config.driver.is_empty() {
            &DEFAULT_ORDER
        } else {
            &config.driver
        };

        for kind in order {
            if let Some(driver) = self.try_open(*kind, config) {
                debug!(name = %config.name, driver = ?kind, "opened storage driver");
                return Ok(driver);
            }
        }

        Err(StorageError::NoDriver {
            name: config.name.clone(),
        })
    }
}
