use color_eyre::{
    eyre::{bail, eyre},
    Result,
};
use serde_json::Value;
use trellis_storage::StorageFactory;

use crate::{cli::StoreCommand, config, storage};

/// Execute a store subcommand against the configured stores.
pub async fn handle(cmd: StoreCommand, config: &config::Config) -> Result<()> {
    let factory = storage::factory_from_config(config)?;
    let output = execute(cmd, &factory).await?;
    println!("{output}");
    Ok(())
}

async fn execute(cmd: StoreCommand, factory: &StorageFactory) -> Result<String> {
    match cmd {
        StoreCommand::List => {
            let lines: Vec<String> = factory
                .list_stores()
                .into_iter()
                .filter_map(|name| factory.get_store(&name))
                .map(|store| match &store.config().description {
                    Some(description) => format!("{}  {description}", store.name()),
                    None => store.name().to_string(),
                })
                .collect();
            if lines.is_empty() {
                return Ok("No stores configured.".into());
            }
            Ok(lines.join("\n"))
        }
        StoreCommand::Get { store, key } => {
            let store = storage::open_store(factory, &store).await?;
            match store.get(&key).await? {
                Some(value) => Ok(serde_json::to_string_pretty(&value)?),
                None => Ok(format!("{key} is not set")),
            }
        }
        StoreCommand::Set { store, key, value } => {
            let store = storage::open_store(factory, &store).await?;
            store.set(&key, parse_value(&value)?).await?;
            Ok(format!("Set {key} in {}", store.name()))
        }
        StoreCommand::Merge { store, key, value } => {
            let store = storage::open_store(factory, &store).await?;
            let Value::Object(partial) = parse_value(&value)? else {
                bail!("merge expects a JSON object");
            };
            let merged = store.merge(&key, partial).await?;
            Ok(serde_json::to_string_pretty(&merged)?)
        }
        StoreCommand::Remove { store, key } => {
            let store = storage::open_store(factory, &store).await?;
            store.remove(&key).await?;
            Ok(format!("Removed {key} from {}", store.name()))
        }
        StoreCommand::Clear { store } => {
            let store = storage::open_store(factory, &store).await?;
            store.clear().await?;
            Ok(format!("Cleared {}", store.name()))
        }
    }
}

fn parse_value(text: &str) -> Result<Value> {
    serde_json::from_str(text).map_err(|e| eyre!("value is not valid JSON: {e}"))
}
