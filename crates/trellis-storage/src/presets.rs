//! Standard store layouts an application usually starts from.

use serde_json::json;

use crate::config::{DriverKind, StorageConfig};

/// Main application storage: encrypted, file first with a memory fallback.
pub fn main(encryption_key: Option<String>) -> StorageConfig {
    StorageConfig::new("main-storage")
        .with_store_name("main")
        .with_drivers([DriverKind::File, DriverKind::Memory])
        .with_encryption(encryption_key)
        .with_initial("user", json!(null))
        .with_initial("todos", json!([]))
        .with_initial("settings", json!({"theme": "light", "language": "en"}))
        .with_version(1)
        .with_description("Main application storage")
}

/// Session-scoped data kept in memory.
pub fn temporary() -> StorageConfig {
    StorageConfig::new("temp-storage")
        .with_store_name("temporary")
        .with_drivers([DriverKind::Memory])
        .with_version(1)
        .with_description("Temporary storage for session data")
}

/// Sensitive data; file-backed only.
pub fn secure(encryption_key: Option<String>) -> StorageConfig {
    StorageConfig::new("secure-storage")
        .with_store_name("secure")
        .with_drivers([DriverKind::File])
        .with_encryption(encryption_key)
        .with_version(1)
        .with_description("Secure storage for sensitive data")
}

/// Cache-only scratch space: writes never reach the driver.
pub fn cache() -> StorageConfig {
    StorageConfig::new("cache-storage")
        .with_store_name("cache")
        .with_drivers([DriverKind::Memory])
        .with_save_on_change(false)
        .with_version(1)
        .with_description("Cache storage for temporary data")
}

pub fn all(encryption_key: Option<String>) -> Vec<StorageConfig> {
    vec![
        main(encryption_key.clone()),
        temporary(),
        secure(encryption_key),
        cache(),
    ]
}
