use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use color_eyre::Result;
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use trellis_router::RouterOptions;
use trellis_storage::{presets, StorageConfig};

/// Environment fallback for the storage encryption secret.
pub const KEY_ENV: &str = "TRELLIS_STORAGE_KEY";

/// User-level configuration loaded from `~/.config/trellis/config.toml` (platform-specific).
#[derive(Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct Config {
    /// Override for the data directory (file driver root).
    pub data_dir: Option<PathBuf>,
    /// Secret for encrypted stores; falls back to `TRELLIS_STORAGE_KEY`.
    pub encryption_key: Option<String>,
    /// Stores to open. Empty means the standard presets.
    #[serde(default)]
    pub stores: Vec<StorageConfig>,
    #[serde(default)]
    pub router: RouterOptions,
}

impl Config {
    pub fn encryption_key(&self) -> Option<String> {
        resolve_key(self.encryption_key.clone(), std::env::var(KEY_ENV).ok())
    }

    /// Store configs to register, with the resolved key filled in wherever
    /// an encrypted store does not name its own.
    pub fn store_configs(&self) -> Vec<StorageConfig> {
        let key = self.encryption_key();
        if self.stores.is_empty() {
            return presets::all(key);
        }
        self.stores
            .iter()
            .cloned()
            .map(|mut store| {
                if store.encrypted && store.encryption_key.is_none() {
                    store.encryption_key = key.clone();
                }
                store
            })
            .collect()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("data_dir", &self.data_dir)
            .field(
                "encryption_key",
                &self.encryption_key.as_ref().map(|_| "<redacted>"),
            )
            .field("stores", &self.stores)
            .field("router", &self.router)
            .finish()
    }
}

fn resolve_key(configured: Option<String>, from_env: Option<String>) -> Option<String> {
    configured.or(from_env).filter(|key| !key.is_empty())
}

/// Load config from the default path; if missing, return defaults.
pub fn load() -> Result<Config> {
    let path = default_path()?;
    load_from_path(path)
}

/// Load config from a given path; if missing or empty, return defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let cfg: Config = toml::from_str(&contents)?;
    Ok(cfg)
}

/// Resolve the default config path (platform aware).
pub fn default_path() -> Result<PathBuf> {
    let base = config_dir().ok_or_else(|| color_eyre::eyre::eyre!("no config dir available"))?;
    Ok(base.join("trellis").join("config.toml"))
}

/// Write `config` to the default path unless a file is already there.
pub fn write_default_if_missing(config: &Config) -> Result<PathBuf> {
    let path = default_path()?;
    write_to_path_if_missing(config, &path)?;
    Ok(path)
}

fn write_to_path_if_missing(config: &Config, path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(config)?;
    fs::write(path, body)?;
    Ok(())
}
