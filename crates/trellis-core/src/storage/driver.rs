use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

/// Errors produced by persistent driver implementations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DriverError {
    /// Underlying storage failure.
    #[error("driver failure: {reason}")]
    Storage { reason: String },
}

impl DriverError {
    pub fn storage(reason: impl Into<String>) -> Self {
        DriverError::Storage {
            reason: reason.into(),
        }
    }
}

/// Persistent key/value contract consumed by keyed storage instances.
///
/// Values are opaque text; encoding and encryption happen above this layer.
/// Each driver handle is already namespaced to a single store.
#[async_trait]
pub trait StorageDriver: Send + Sync {
    /// Read the raw value for a key, `None` when the key was never written.
    async fn get_item(&self, key: &str) -> Result<Option<String>, DriverError>;

    /// Persist a value under a key, overwriting any existing entry.
    async fn set_item(&self, key: &str, value: &str) -> Result<(), DriverError>;

    /// Remove a key and its value (idempotent).
    async fn remove_item(&self, key: &str) -> Result<(), DriverError>;

    /// Drop every entry of this namespace.
    async fn clear(&self) -> Result<(), DriverError>;
}

/// Map-backed driver. Clones share the same underlying map, so a test can keep
/// a handle and inspect exactly what a store wrote.
#[derive(Debug, Default, Clone)]
pub struct MemoryDriver {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

#[async_trait]
impl StorageDriver for MemoryDriver {
    async fn get_item(&self, key: &str) -> Result<Option<String>, DriverError> {
        Ok(self.inner.lock().get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), DriverError> {
        self.inner.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), DriverError> {
        self.inner.lock().remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), DriverError> {
        self.inner.lock().clear();
        Ok(())
    }
}
