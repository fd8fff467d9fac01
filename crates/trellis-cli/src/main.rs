mod cli;
mod config;
mod route;
mod storage;
mod store;

use std::path::Path;

use crate::cli::ConfigCommand;
use clap::Parser;
use color_eyre::Result;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use trellis_storage::{DriverKind, StorageConfig};

const PROBE_STORE: &str = "health-probe";
const PROBE_KEY: &str = "probe";

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    match cli.command {
        cli::Command::Version => print_version(),
        cli::Command::Health => run_health_check(&config).await?,
        cli::Command::Config(ConfigCommand::Init) => init_config(&config)?,
        cli::Command::Route { paths } => route::handle(paths, &config).await?,
        cli::Command::Store(cmd) => store::handle(cmd, &config).await?,
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("trellis {}", env!("CARGO_PKG_VERSION"));
}

/// Runs a quick health check of the encrypted file storage path.
async fn run_health_check(config: &config::Config) -> Result<()> {
    let root = storage::data_root(config)?;
    let secret = config
        .encryption_key()
        .unwrap_or_else(|| PROBE_STORE.to_string());
    run_store_health(&root, &secret).await?;
    println!("Storage: ok");
    Ok(())
}

/// Writes through one factory and reads back through a second, so the value
/// has to come off disk rather than out of the first store's cache.
async fn run_store_health(root: &Path, secret: &str) -> Result<()> {
    let probe = StorageConfig::new(PROBE_STORE)
        .with_drivers([DriverKind::File])
        .with_encryption(Some(secret.to_string()));
    let payload = json!({"status": "ok"});

    let writer = storage::factory_at(root);
    writer.create(probe.clone())?;
    storage::open_store(&writer, PROBE_STORE)
        .await?
        .set(PROBE_KEY, payload.clone())
        .await?;

    let reader = storage::factory_at(root);
    reader.create(probe)?;
    let round_trip = storage::open_store(&reader, PROBE_STORE)
        .await?
        .get(PROBE_KEY)
        .await?;
    reader.remove_store(PROBE_STORE).await?;

    if round_trip.as_ref() != Some(&payload) {
        color_eyre::eyre::bail!("storage round-trip failed");
    }
    Ok(())
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}
