use clap::{Parser, Subcommand};

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "trellis",
    about = "Route matching and keyed storage from the command line",
    version,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print version and exit.
    Version,
    /// Round-trip a probe value through an encrypted store on the data dir.
    Health,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Navigate the configured router to each path and print the state.
    Route {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Inspect or edit configured stores.
    #[command(subcommand)]
    Store(StoreCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum StoreCommand {
    /// List configured store names.
    List,
    /// Print the value stored under a key.
    Get { store: String, key: String },
    /// Store a JSON value under a key.
    Set {
        store: String,
        key: String,
        value: String,
    },
    /// Shallow-merge a JSON object into the value under a key.
    Merge {
        store: String,
        key: String,
        value: String,
    },
    /// Delete a key.
    Remove { store: String, key: String },
    /// Delete every key of a store.
    Clear { store: String },
}
