use std::{collections::HashMap, fmt, sync::Arc};

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{Mutex as AsyncMutex, OnceCell};
use tracing::{error, instrument, warn};
use trellis_core::{StorageDriver, SubscriberSet, Subscription};

use crate::{
    codec::Codec,
    config::StorageConfig,
    error::{codec_err, StorageError},
};

/// Change callback: `(new_value, old_value)`. `None` means absent.
pub type ChangeCallback = dyn Fn(Option<&Value>, Option<&Value>) + Send + Sync;

/// Keyed JSON store with an in-memory cache in front of a persistent driver.
///
/// The cache is authoritative once a key is populated: reads hit it without
/// I/O, and writes update it before persisting. Reads never fail on I/O or
/// decode errors; they log and report the key as absent. Writes surface driver
/// errors to the caller after the cache was already updated, so the two can
/// diverge when the driver fails.
pub struct EnhancedStorage {
    config: StorageConfig,
    driver: Arc<dyn StorageDriver>,
    codec: Codec,
    cache: Mutex<HashMap<String, Value>>,
    subscribers: Mutex<HashMap<String, SubscriberSet<ChangeCallback>>>,
    initialized: OnceCell<()>,
    /// Serializes driver mutations with seeding, so a seed never lands on top
    /// of a write that raced it.
    write_gate: AsyncMutex<()>,
}

impl EnhancedStorage {
    pub fn new(config: StorageConfig, driver: Arc<dyn StorageDriver>) -> Result<Self, StorageError> {
        if config.encrypted && config.encryption_key.is_none() {
            warn!(name = %config.name, "encryption requested without a key; values are stored as plain JSON");
        }
        let codec = Codec::from_config(&config)?;
        let cache = initial_cache(&config);

        Ok(Self {
            config,
            driver,
            codec,
            cache: Mutex::new(cache),
            subscribers: Mutex::new(HashMap::new()),
            initialized: OnceCell::new(),
            write_gate: AsyncMutex::new(()),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Seed the driver with `initial_state` for keys it does not hold yet and
    /// load the ones it does into the cache.
    ///
    /// Keys the caller wrote or removed before the run reached them are left
    /// alone. A persisted value that no longer decodes is replaced by its
    /// initial value. A read or write error fails the run, but only after
    /// every other key was seeded.
    ///
    /// Runs once; concurrent callers wait for the same run. A failed run is
    /// logged and may be retried by calling again.
    pub async fn initialize(&self) -> Result<(), StorageError> {
        self.initialized
            .get_or_try_init(|| self.seed())
            .await
            .map(|_| ())
    }

    #[instrument(skip_all, fields(name = %self.config.name))]
    async fn seed(&self) -> Result<(), StorageError> {
        let result = self.seed_keys().await;
        if let Err(err) = &result {
            error!(error = %err, "storage initialization error");
        }
        result
    }

    async fn seed_keys(&self) -> Result<(), StorageError> {
        let mut first_err = None;
        for (key, initial) in &self.config.initial_state {
            if let Err(err) = self.seed_key(key, initial).await {
                warn!(key = %key, error = %err, "failed to seed item");
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    async fn seed_key(&self, key: &str, initial: &Value) -> Result<(), StorageError> {
        let _gate = self.write_gate.lock().await;
        // A caller write or removal since construction owns the key now.
        if self.cache.lock().get(key) != Some(initial) {
            return Ok(());
        }

        let persisted = match self.driver.get_item(key).await? {
            Some(text) => match self.codec.decode(&text) {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(key = %key, error = %err, "undecodable item; reseeding initial value");
                    None
                }
            },
            None => None,
        };

        match persisted {
            Some(value) => {
                self.cache.lock().insert(key.to_string(), value);
            }
            None => {
                let text = self.codec.encode(initial)?;
                self.driver.set_item(key, &text).await?;
            }
        }
        Ok(())
    }

    /// Read a key: cache first, then the driver. Only an invalid key is an error.
    #[instrument(skip_all, fields(name = %self.config.name, key = %key))]
    pub async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        validate_key(key)?;
        let cached = self.cache.lock().get(key).cloned();
        if cached.is_some() {
            return Ok(cached);
        }

        match self.read_through(key).await {
            Ok(value) => Ok(value),
            Err(err) => {
                error!(error = %err, "failed to get item \"{}\"", key);
                Ok(None)
            }
        }
    }

    // Misses are not cached, so the next get reads the driver again.
    async fn read_through(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let Some(text) = self.driver.get_item(key).await? else {
            return Ok(None);
        };
        let value = self.codec.decode(&text)?;
        self.cache.lock().insert(key.to_string(), value.clone());
        Ok(Some(value))
    }

    /// Write a key: cache, then driver (when `save_on_change`), then subscribers.
    ///
    /// On a driver error the cache already holds `value` and subscribers are
    /// not called.
    #[instrument(skip_all, fields(name = %self.config.name, key = %key))]
    pub async fn set(&self, key: &str, value: Value) -> Result<Value, StorageError> {
        validate_key(key)?;
        let gate = self.write_gate.lock().await;
        let old = self.cache.lock().insert(key.to_string(), value.clone());

        if self.config.save_on_change {
            let text = self.codec.encode(&value)?;
            self.driver.set_item(key, &text).await?;
        }
        drop(gate);

        self.notify(key, Some(&value), old.as_ref());
        Ok(value)
    }

    /// Shallow-merge `partial` over the current object and store the result.
    ///
    /// A non-object or missing current value merges onto `{}`. This is a
    /// read-modify-write across an await point: two merges on the same key
    /// running concurrently can lose one update.
    pub async fn merge(&self, key: &str, partial: Map<String, Value>) -> Result<Value, StorageError> {
        let mut merged = match self.get(key).await? {
            Some(Value::Object(current)) => current,
            _ => Map::new(),
        };
        merged.extend(partial);
        self.set(key, Value::Object(merged)).await
    }

    /// Delete a key from cache and driver, then notify with `(None, previous)`.
    #[instrument(skip_all, fields(name = %self.config.name, key = %key))]
    pub async fn remove(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        let gate = self.write_gate.lock().await;
        let old = self.cache.lock().remove(key);
        self.driver.remove_item(key).await?;
        drop(gate);
        self.notify(key, None, old.as_ref());
        Ok(())
    }

    /// Reset the cache to `initial_state` and wipe the driver namespace.
    /// No change notifications are sent.
    #[instrument(skip_all, fields(name = %self.config.name))]
    pub async fn clear(&self) -> Result<(), StorageError> {
        let _gate = self.write_gate.lock().await;
        *self.cache.lock() = initial_cache(&self.config);
        self.driver.clear().await?;
        Ok(())
    }

    /// Subscribe to writes and removals of `key`. Callbacks run in
    /// registration order, synchronously inside the mutating call.
    pub fn on_change<F>(&self, key: &str, callback: F) -> Subscription
    where
        F: Fn(Option<&Value>, Option<&Value>) + Send + Sync + 'static,
    {
        let set = self
            .subscribers
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone();
        set.insert(Arc::new(callback))
    }

    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.get(key).await? {
            Some(value) => serde_json::from_value(value).map(Some).map_err(codec_err),
            None => Ok(None),
        }
    }

    pub async fn set_as<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let value = serde_json::to_value(value).map_err(codec_err)?;
        self.set(key, value).await.map(|_| ())
    }

    fn notify(&self, key: &str, new: Option<&Value>, old: Option<&Value>) {
        let set = self.subscribers.lock().get(key).cloned();
        if let Some(set) = set {
            for callback in set.snapshot() {
                callback(new, old);
            }
        }
    }
}

impl fmt::Debug for EnhancedStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnhancedStorage")
            .field("config", &self.config)
            .field("codec", &self.codec)
            .field("cached_keys", &self.cache.lock().len())
            .finish()
    }
}

fn initial_cache(config: &StorageConfig) -> HashMap<String, Value> {
    config.initial_state.clone().into_iter().collect()
}

fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey {
            key: key.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use serde::Deserialize;
    use serde_json::json;
    use trellis_core::DriverError;

    use super::*;
    use crate::test_support::{GatedDriver, RecordingDriver};

    type Changes = Arc<Mutex<Vec<(Option<Value>, Option<Value>)>>>;

    fn settings_config() -> StorageConfig {
        StorageConfig::new("test-storage")
            .with_store_name("test")
            .with_encryption(Some("test-key".into()))
            .with_initial("settings", json!({"theme": "light", "language": "en"}))
    }

    fn storage_with(config: StorageConfig) -> (EnhancedStorage, RecordingDriver) {
        let driver = RecordingDriver::new();
        let storage = EnhancedStorage::new(config, Arc::new(driver.clone())).expect("storage");
        (storage, driver)
    }

    fn record(storage: &EnhancedStorage, key: &str) -> (Changes, Subscription) {
        let changes: Changes = Arc::default();
        let sink = Arc::clone(&changes);
        let subscription = storage.on_change(key, move |new, old| {
            sink.lock().push((new.cloned(), old.cloned()));
        });
        (changes, subscription)
    }

    fn sealed(secret: &str) -> Codec {
        Codec::sealed(secret).expect("codec")
    }

    #[tokio::test]
    async fn set_encrypts_before_writing() {
        let (storage, driver) = storage_with(settings_config());
        let data = json!({"theme": "dark", "language": "en"});

        let stored = storage.set("settings", data.clone()).await.expect("set");
        assert_eq!(stored, data);
        assert_eq!(driver.sets(), 1);

        let raw = driver.raw("settings").await.expect("written");
        assert_ne!(raw, serde_json::to_string(&data).expect("json"));
        assert_eq!(sealed("test-key").decode(&raw).expect("decode"), data);
    }

    #[tokio::test]
    async fn writes_plain_json_when_encryption_disabled() {
        let mut config = settings_config();
        config.encrypted = false;
        let (storage, driver) = storage_with(config);
        let data = json!({"theme": "dark", "language": "en"});

        storage.set("settings", data.clone()).await.expect("set");
        assert_eq!(
            driver.raw("settings").await,
            Some(serde_json::to_string(&data).expect("json"))
        );
    }

    #[tokio::test]
    async fn writes_plain_json_when_key_missing() {
        let config = settings_config().with_encryption(None);
        let (storage, driver) = storage_with(config);
        let data = json!({"theme": "dark", "language": "en"});

        storage.set("settings", data.clone()).await.expect("set");
        assert_eq!(
            driver.raw("settings").await,
            Some(serde_json::to_string(&data).expect("json"))
        );
    }

    #[tokio::test]
    async fn set_notifies_with_new_and_old_values() {
        let (storage, _driver) = storage_with(settings_config());
        let (changes, _subscription) = record(&storage, "settings");

        let data = json!({"theme": "dark", "language": "fr"});
        storage.set("settings", data.clone()).await.expect("set");

        assert_eq!(
            *changes.lock(),
            vec![(
                Some(data),
                Some(json!({"theme": "light", "language": "en"}))
            )]
        );
    }

    #[tokio::test]
    async fn get_decrypts_persisted_value() {
        let (storage, driver) = storage_with(settings_config());
        let data = json!({"theme": "light", "language": "en"});
        let encrypted = sealed("test-key").encode(&data).expect("encode");
        driver
            .inner
            .set_item("profile", &encrypted)
            .await
            .expect("seed");

        assert_eq!(storage.get("profile").await.expect("get"), Some(data));
    }

    #[tokio::test]
    async fn missing_key_is_none_and_not_cached() {
        let (storage, driver) = storage_with(settings_config());

        assert_eq!(storage.get("nonexistent").await.expect("get"), None);
        assert_eq!(storage.get("nonexistent").await.expect("get"), None);
        assert_eq!(driver.gets(), 2);
    }

    #[tokio::test]
    async fn cached_value_skips_the_driver() {
        let (storage, driver) = storage_with(settings_config());
        let data = json!({"theme": "dark", "language": "en"});
        storage.set("settings", data.clone()).await.expect("set");
        let baseline = driver.gets();

        assert_eq!(storage.get("settings").await.expect("get"), Some(data));
        assert_eq!(driver.gets(), baseline);
    }

    #[tokio::test]
    async fn read_failures_degrade_to_none() {
        let (storage, driver) = storage_with(settings_config());
        driver.fail_get.store(true, Ordering::SeqCst);
        assert_eq!(storage.get("nonexistent").await.expect("get"), None);

        driver.fail_get.store(false, Ordering::SeqCst);
        driver
            .inner
            .set_item("garbled", "not a sealed blob")
            .await
            .expect("seed");
        assert_eq!(storage.get("garbled").await.expect("get"), None);
    }

    #[tokio::test]
    async fn empty_key_is_rejected() {
        let (storage, _driver) = storage_with(settings_config());
        let err = storage.get("").await.expect_err("empty key");
        assert_eq!(err, StorageError::InvalidKey { key: String::new() });
        assert!(storage.set("", json!(1)).await.is_err());
    }

    #[tokio::test]
    async fn merge_overlays_existing_object() {
        let config = StorageConfig::new("test-storage").with_encryption(Some("test-key".into()));
        let (storage, driver) = storage_with(config);
        let initial = json!({"theme": "light", "language": "en"});
        driver
            .inner
            .set_item("settings", &sealed("test-key").encode(&initial).expect("encode"))
            .await
            .expect("seed");

        let mut update = Map::new();
        update.insert("theme".into(), json!("dark"));
        let merged = storage.merge("settings", update).await.expect("merge");

        let expected = json!({"theme": "dark", "language": "en"});
        assert_eq!(merged, expected);
        let raw = driver.raw("settings").await.expect("written");
        assert_eq!(sealed("test-key").decode(&raw).expect("decode"), expected);
    }

    #[tokio::test]
    async fn merge_onto_absent_key_starts_empty() {
        let (storage, _driver) = storage_with(StorageConfig::new("plain"));
        let mut partial = Map::new();
        partial.insert("language".into(), json!("de"));

        let merged = storage.merge("prefs", partial).await.expect("merge");
        assert_eq!(merged, json!({"language": "de"}));
    }

    #[tokio::test]
    async fn remove_reports_previous_value() {
        let (storage, driver) = storage_with(settings_config());
        storage
            .set("settings", json!({"theme": "dark"}))
            .await
            .expect("set");
        let (changes, _subscription) = record(&storage, "settings");

        storage.remove("settings").await.expect("remove");

        assert_eq!(driver.removes(), 1);
        assert_eq!(driver.raw("settings").await, None);
        assert_eq!(
            *changes.lock(),
            vec![(None, Some(json!({"theme": "dark"})))]
        );
    }

    #[tokio::test]
    async fn clear_resets_to_initial_state_without_notifying() {
        let (storage, driver) = storage_with(settings_config());
        storage
            .set("settings", json!({"theme": "dark"}))
            .await
            .expect("set");
        let (changes, _subscription) = record(&storage, "settings");

        storage.clear().await.expect("clear");

        assert_eq!(driver.clears(), 1);
        assert!(driver.inner.is_empty());
        assert_eq!(
            storage.get("settings").await.expect("get"),
            Some(json!({"theme": "light", "language": "en"}))
        );
        assert!(changes.lock().is_empty());
    }

    #[tokio::test]
    async fn subscribers_run_in_order_until_unsubscribed() {
        let (storage, _driver) = storage_with(settings_config());
        let order = Arc::new(Mutex::new(Vec::new()));
        let first_sink = Arc::clone(&order);
        let second_sink = Arc::clone(&order);
        let first = storage.on_change("settings", move |_, _| first_sink.lock().push("first"));
        let _second = storage.on_change("settings", move |_, _| second_sink.lock().push("second"));

        storage.set("settings", json!(1)).await.expect("set");
        first.unsubscribe();
        first.unsubscribe();
        storage.set("settings", json!(2)).await.expect("set again");

        assert_eq!(*order.lock(), vec!["first", "second", "second"]);
    }

    #[tokio::test]
    async fn other_keys_do_not_notify() {
        let (storage, _driver) = storage_with(settings_config());
        let (changes, _subscription) = record(&storage, "settings");
        storage.set("todos", json!([])).await.expect("set");
        assert!(changes.lock().is_empty());
    }

    #[tokio::test]
    async fn write_failure_leaves_cache_updated_and_skips_notify() {
        let (storage, driver) = storage_with(settings_config());
        let (changes, _subscription) = record(&storage, "settings");
        driver.fail_set.store(true, Ordering::SeqCst);

        let err = storage
            .set("settings", json!({"theme": "dark"}))
            .await
            .expect_err("driver write fails");
        assert_eq!(err, StorageError::Driver(DriverError::storage("set failed")));

        assert_eq!(
            storage.get("settings").await.expect("get"),
            Some(json!({"theme": "dark"}))
        );
        assert!(changes.lock().is_empty());
    }

    #[tokio::test]
    async fn cache_only_store_never_writes() {
        let config = StorageConfig::new("cache-storage").with_save_on_change(false);
        let (storage, driver) = storage_with(config);
        let (changes, _subscription) = record(&storage, "k");

        storage.set("k", json!("v")).await.expect("set");

        assert_eq!(driver.sets(), 0);
        assert_eq!(storage.get("k").await.expect("get"), Some(json!("v")));
        assert_eq!(changes.lock().len(), 1);
    }

    #[tokio::test]
    async fn initialize_seeds_missing_keys_once() {
        let (storage, driver) = storage_with(settings_config());

        storage.initialize().await.expect("initialize");
        storage.initialize().await.expect("initialize again");

        assert_eq!(driver.sets(), 1);
        let raw = driver.raw("settings").await.expect("seeded");
        assert_eq!(
            sealed("test-key").decode(&raw).expect("decode"),
            json!({"theme": "light", "language": "en"})
        );
    }

    #[tokio::test]
    async fn initialize_loads_persisted_values_into_cache() {
        let driver = RecordingDriver::new();
        let persisted = json!({"theme": "dark", "language": "fr"});
        driver
            .inner
            .set_item("settings", &sealed("test-key").encode(&persisted).expect("encode"))
            .await
            .expect("seed");
        let storage =
            EnhancedStorage::new(settings_config(), Arc::new(driver.clone())).expect("storage");

        storage.initialize().await.expect("initialize");

        assert_eq!(driver.sets(), 0);
        assert_eq!(storage.get("settings").await.expect("get"), Some(persisted));
    }

    #[tokio::test]
    async fn failed_initialize_can_be_retried() {
        let (storage, driver) = storage_with(settings_config());
        driver.fail_get.store(true, Ordering::SeqCst);
        assert!(storage.initialize().await.is_err());

        driver.fail_get.store(false, Ordering::SeqCst);
        storage.initialize().await.expect("retry");
        assert!(driver.raw("settings").await.is_some());
    }

    #[tokio::test]
    async fn write_racing_initialize_is_not_overwritten() {
        let driver = GatedDriver::new();
        let storage = Arc::new(
            EnhancedStorage::new(settings_config(), Arc::new(driver.clone())).expect("storage"),
        );
        let seeding = tokio::spawn({
            let storage = Arc::clone(&storage);
            async move { storage.initialize().await }
        });
        driver.entered.notified().await;

        let dark = json!({"theme": "dark", "language": "en"});
        let writing = tokio::spawn({
            let storage = Arc::clone(&storage);
            let dark = dark.clone();
            async move { storage.set("settings", dark).await }
        });
        tokio::task::yield_now().await;
        driver.release.notify_one();

        seeding.await.expect("join").expect("initialize");
        writing.await.expect("join").expect("set");

        let raw = driver.inner.raw("settings").await.expect("persisted");
        assert_eq!(sealed("test-key").decode(&raw).expect("decode"), dark);
        assert_eq!(storage.get("settings").await.expect("get"), Some(dark));
    }

    #[tokio::test]
    async fn initialize_reseeds_undecodable_keys_and_seeds_the_rest() {
        let config = StorageConfig::new("plain")
            .with_initial("user", json!(null))
            .with_initial("todos", json!([]));
        let driver = RecordingDriver::new();
        driver
            .inner
            .set_item("user", "not json")
            .await
            .expect("seed");
        let storage = EnhancedStorage::new(config, Arc::new(driver.clone())).expect("storage");

        storage.initialize().await.expect("initialize");

        assert_eq!(driver.raw("user").await.as_deref(), Some("null"));
        assert_eq!(driver.raw("todos").await.as_deref(), Some("[]"));
        assert_eq!(storage.get("user").await.expect("get"), Some(json!(null)));
    }

    #[tokio::test]
    async fn typed_helpers_round_trip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Settings {
            theme: String,
            language: String,
        }

        let (storage, _driver) = storage_with(settings_config());
        let settings = Settings {
            theme: "dark".into(),
            language: "en".into(),
        };
        storage.set_as("settings", &settings).await.expect("set_as");
        let loaded: Option<Settings> = storage.get_as("settings").await.expect("get_as");
        assert_eq!(loaded, Some(settings));
    }
}
