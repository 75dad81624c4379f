pub mod audit;
pub mod auth;
pub mod checkpoint;
pub mod cleanup;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod processor;
pub mod provisioner;
pub mod reconciler;
pub mod records;
pub mod retry;
pub mod store;
pub mod transport;

pub use config::{ConfigError, MediatorConfig};
pub use error::{MediatorError, MediatorResult};

/// Build a [`client::DirectoryClient`] and open the [`store::MirrorStore`]
/// described by a configuration.
///
/// This is the single shared helper every entrypoint uses to wire the
/// transport, client and store together.
pub fn connect(
    config: &MediatorConfig,
) -> MediatorResult<(client::DirectoryClient, store::MirrorStore)> {
    let transport = transport::Transport::new(config)?;
    let store = store::MirrorStore::open(&config.data_dir)?;
    Ok((client::DirectoryClient::new(transport), store))
}
