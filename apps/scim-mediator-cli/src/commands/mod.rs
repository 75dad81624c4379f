//! Subcommand implementations and the context they share.

pub mod cleanup_users;
pub mod create_group;
pub mod create_user;
pub mod manage_group_members;
pub mod populate;
pub mod process_batch;
pub mod refresh;

use std::path::Path;

use scim_mediator::client::DirectoryClient;
use scim_mediator::store::MirrorStore;
use scim_mediator::MediatorConfig;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::{CliError, CliResult};

/// Everything a command needs, wired once per invocation.
pub struct Context {
    pub config: MediatorConfig,
    pub client: DirectoryClient,
    pub store: MirrorStore,
    pub cancel: CancellationToken,
}

impl Context {
    pub fn new(config: MediatorConfig, cancel: CancellationToken) -> CliResult<Self> {
        let (client, store) = scim_mediator::connect(&config)?;
        Ok(Self {
            config,
            client,
            store,
            cancel,
        })
    }
}

/// Print a command result as pretty JSON on stdout.
pub fn print_summary<T: Serialize>(summary: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

/// Read and decode a JSON input file.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> CliResult<T> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| CliError::Input(format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_str(&contents)
        .map_err(|e| CliError::Input(format!("invalid JSON in {}: {e}", path.display())))
}
