use std::{
    fs::{self, File},
    io::{ErrorKind, Read, Write},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::instrument;
use trellis_core::{DriverError, StorageDriver};

/// File-backed driver: one file per key inside a namespace directory.
///
/// Writes go through a temp file that is persisted over the target, so a
/// reader never observes a half-written value.
#[derive(Debug, Clone)]
pub struct FileDriver {
    root: PathBuf,
}

impl FileDriver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Namespace directory for a store: `<base>/<name>/<store_name>`.
    pub fn namespaced(base: &Path, name: &str, store_name: &str) -> Self {
        Self::new(base.join(sanitize(name)).join(sanitize(store_name)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(sanitize(key))
    }
}

#[async_trait]
impl StorageDriver for FileDriver {
    #[instrument(skip_all, fields(key = %key))]
    async fn get_item(&self, key: &str) -> Result<Option<String>, DriverError> {
        let mut file = match File::open(self.path_for(key)) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(driver_err(err)),
        };

        let mut buf = String::new();
        file.read_to_string(&mut buf).map_err(driver_err)?;
        Ok(Some(buf))
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn set_item(&self, key: &str, value: &str) -> Result<(), DriverError> {
        fs::create_dir_all(&self.root).map_err(driver_err)?;

        let mut tmp = NamedTempFile::new_in(&self.root).map_err(driver_err)?;
        tmp.write_all(value.as_bytes()).map_err(driver_err)?;
        tmp.flush().map_err(driver_err)?;
        tmp.persist(self.path_for(key))
            .map_err(|e| driver_err(e.error))?;
        Ok(())
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn remove_item(&self, key: &str) -> Result<(), DriverError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(driver_err(err)),
        }
    }

    #[instrument(skip_all, fields(root = %self.root.display()))]
    async fn clear(&self) -> Result<(), DriverError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(driver_err(err)),
        };

        for entry in entries {
            let path = entry.map_err(driver_err)?.path();
            if path.is_file() {
                fs::remove_file(&path).map_err(driver_err)?;
            }
        }
        Ok(())
    }
}

/// Longest encoded name used verbatim; anything longer is replaced by a digest
/// to stay under filesystem name limits.
const MAX_ENCODED_LEN: usize = 128;

fn sanitize(segment: &str) -> String {
    let encoded = URL_SAFE_NO_PAD.encode(segment);
    if encoded.len() <= MAX_ENCODED_LEN {
        return encoded;
    }
    // `~` is outside the base64url alphabet, so digests never collide with
    // verbatim names.
    format!("~{}", URL_SAFE_NO_PAD.encode(Sha256::digest(segment.as_bytes())))
}

fn driver_err<E: ToString>(err: E) -> DriverError {
    DriverError::storage(err.to_string())
}
