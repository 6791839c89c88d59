pub mod config;
pub mod discovery;
pub mod ipc;
pub mod listener;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Ipc(#[from] ipc::IpcError),

    #[error(transparent)]
    Discovery(#[from] discovery::DiscoveryError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Model(#[from] models::ModelError),
}
