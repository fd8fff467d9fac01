//! Keyed, cache-backed storage instances with optional encryption at rest.
//! Values are JSON; encryption uses AES-GCM with a key derived from the
//! configured secret. Instances are created and tracked by a `StorageFactory`.

pub mod codec;
pub mod config;
pub mod enhanced;
pub mod error;
pub mod factory;
pub mod file_driver;
pub mod presets;
pub mod provider;

#[cfg(test)]
mod test_support;

pub use config::{DriverKind, StorageConfig};
pub use enhanced::{ChangeCallback, EnhancedStorage};
pub use error::StorageError;
pub use factory::StorageFactory;
pub use provider::{DriverProvider, DriverSet};
