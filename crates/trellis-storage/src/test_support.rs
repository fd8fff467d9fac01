use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use tokio::sync::Notify;
use trellis_core::{DriverError, MemoryDriver, StorageDriver};

/// Memory driver that counts calls and fails on demand.
#[derive(Debug, Default, Clone)]
pub struct RecordingDriver {
    pub inner: MemoryDriver,
    pub gets: Arc<AtomicUsize>,
    pub sets: Arc<AtomicUsize>,
    pub removes: Arc<AtomicUsize>,
    pub clears: Arc<AtomicUsize>,
    pub fail_get: Arc<AtomicBool>,
    pub fail_set: Arc<AtomicBool>,
    pub fail_clear: Arc<AtomicBool>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn removes(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    /// Raw text last written for `key`.
    pub async fn raw(&self, key: &str) -> Option<String> {
        self.inner.get_item(key).await.expect("memory driver get")
    }
}

#[async_trait]
impl StorageDriver for RecordingDriver {
    async fn get_item(&self, key: &str) -> Result<Option<String>, DriverError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(DriverError::storage("get failed"));
        }
        self.inner.get_item(key).await
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), DriverError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(DriverError::storage("set failed"));
        }
        self.inner.set_item(key, value).await
    }

    async fn remove_item(&self, key: &str) -> Result<(), DriverError> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.inner.remove_item(key).await
    }

    async fn clear(&self) -> Result<(), DriverError> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        if self.fail_clear.load(Ordering::SeqCst) {
            return Err(DriverError::storage("clear failed"));
        }
        self.inner.clear().await
    }
}

/// Recording driver whose first `get_item` parks until `release` fires.
/// `entered` fires once that read has started.
#[derive(Debug, Clone, Default)]
pub struct GatedDriver {
    pub inner: RecordingDriver,
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
    armed: Arc<AtomicBool>,
}

impl GatedDriver {
    pub fn new() -> Self {
        Self {
            armed: Arc::new(AtomicBool::new(true)),
            ..Self::default()
        }
    }
}

#[async_trait]
impl StorageDriver for GatedDriver {
    async fn get_item(&self, key: &str) -> Result<Option<String>, DriverError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.get_item(key).await
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), DriverError> {
        self.inner.set_item(key, value).await
    }

    async fn remove_item(&self, key: &str) -> Result<(), DriverError> {
        self.inner.remove_item(key).await
    }

    async fn clear(&self) -> Result<(), DriverError> {
        self.inner.clear().await
    }
}
