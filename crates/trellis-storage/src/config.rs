use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Persistent backends a store may be opened on, in preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Files under the configured data directory.
    File,
    /// Process memory; lost on exit.
    Memory,
}

/// Configuration of a single keyed storage instance.
///
/// Fixed once the instance exists; a second `create` with the same name does
/// not apply a new config.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Unique registry name; also the driver namespace.
    pub name: String,
    pub store_name: String,
    /// Driver preference; empty means the provider's default order.
    #[serde(default)]
    pub driver: Vec<DriverKind>,
    #[serde(default)]
    pub encrypted: bool,
    /// Secret the cipher key is derived from. Encryption stays off without it.
    #[serde(default)]
    pub encryption_key: Option<String>,
    /// Persist on every write. When false, writes only touch the cache.
    #[serde(default = "default_save_on_change")]
    pub save_on_change: bool,
    /// Values seeded into the cache and, on initialize, into the driver.
    #[serde(default)]
    pub initial_state: Map<String, Value>,
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_save_on_change() -> bool {
    true
}

impl StorageConfig {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            store_name: format!("{name}_store"),
            name,
            driver: Vec::new(),
            encrypted: false,
            encryption_key: None,
            save_on_change: true,
            initial_state: Map::new(),
            version: None,
            description: None,
        }
    }

    pub fn with_store_name(mut self, store_name: impl Into<String>) -> Self {
        self.store_name = store_name.into();
        self
    }

    pub fn with_drivers(mut self, drivers: impl IntoIterator<Item = DriverKind>) -> Self {
        self.driver = drivers.into_iter().collect();
        self
    }

    /// Turn encryption on; `key: None` keeps values in plain JSON.
    pub fn with_encryption(mut self, key: Option<String>) -> Self {
        self.encrypted = true;
        self.encryption_key = key;
        self
    }

    pub fn with_save_on_change(mut self, save_on_change: bool) -> Self {
        self.save_on_change = save_on_change;
        self
    }

    pub fn with_initial(mut self, key: impl Into<String>, value: Value) -> Self {
        self.initial_state.insert(key.into(), value);
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// True when values actually go through the cipher.
    pub fn encryption_active(&self) -> bool {
        self.encrypted && self.encryption_key.is_some()
    }
}

// Keeps the secret out of logs.
impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("name", &self.name)
            .field("store_name", &self.store_name)
            .field("driver", &self.driver)
            .field("encrypted", &self.encrypted)
            .field(
                "encryption_key",
                &self.encryption_key.as_ref().map(|_| "<redacted>"),
            )
            .field("save_on_change", &self.save_on_change)
            .field("initial_state", &self.initial_state)
            .field("version", &self.version)
            .field("description", &self.description)
            .finish()
    }
}
