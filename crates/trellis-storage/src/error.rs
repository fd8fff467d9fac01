use thiserror::Error;
use trellis_core::DriverError;

/// Errors produced by keyed storage and the store registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    /// Keys must be non-empty.
    #[error("invalid storage key: {key:?}")]
    InvalidKey { key: String },
    /// Persistent driver failure.
    #[error(transparent)]
    Driver(#[from] DriverError),
    /// Serialization or encryption failure.
    #[error("codec failure: {reason}")]
    Codec { reason: String },
    /// None of the configured drivers can be opened.
    #[error("no driver available for store {name:?}")]
    NoDriver { name: String },
    /// The store was never created.
    #[error("storage {name:?} has not been created")]
    UnknownStore { name: String },
}

pub(crate) fn codec_err<E: ToString>(err: E) -> StorageError {
    StorageError::Codec {
        reason: err.to_string(),
    }
}
