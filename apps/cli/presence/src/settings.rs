//! Where the application keeps its files and how the client config is assembled.
//!
//! Resolution order for every setting:
//! 1. Environment (including a `.env` file in the working directory)
//! 2. `config.json` in the config directory
//! 3. Built-in defaults

use crate::error::PresenceAppError;

use common::ErrorLocation;
use presence_core::{ClientConfig, CoreError};

use std::panic::Location;
use std::path::PathBuf;

use log::{debug, info, warn};

pub const ENV_CLIENT_ID: &str = "PRESENCE_CLIENT_ID";
pub const ENV_SOCKET_INDEX: &str = "PRESENCE_SOCKET_INDEX";
pub const ENV_CONFIG_DIR: &str = "PRESENCE_CONFIG_DIR";

const APP_DIR_NAME: &str = "presence";
const LOG_DIR_NAME: &str = "logs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSource {
    EnvVar,
    PlatformDefault,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub log_dir: PathBuf,
    pub source: PathSource,
}

/// Resolve the config and log directories.
///
/// # Errors
///
/// Returns [`PresenceAppError::App`] if neither the override nor the platform
/// config directory is available.
pub fn resolve_paths() -> Result<AppPaths, PresenceAppError> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let config_dir = PathBuf::from(dir);
        info!("Using {ENV_CONFIG_DIR} override: {}", config_dir.display());
        return Ok(AppPaths {
            log_dir: config_dir.join(LOG_DIR_NAME),
            config_dir,
            source: PathSource::EnvVar,
        });
    }

    let Some(base) = dirs::config_dir() else {
        return Err(PresenceAppError::App {
            message: format!("No platform config directory; set {ENV_CONFIG_DIR}"),
            location: ErrorLocation::from(Location::caller()),
        });
    };

    let config_dir = base.join(APP_DIR_NAME);
    let log_dir = dirs::data_local_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join(LOG_DIR_NAME))
        .unwrap_or_else(|| config_dir.join(LOG_DIR_NAME));

    Ok(AppPaths {
        config_dir,
        log_dir,
        source: PathSource::PlatformDefault,
    })
}

/// Load `.env` from the working directory if there is one.
pub fn try_load_dotenv() -> Option<PathBuf> {
    match dotenvy::dotenv() {
        Ok(path) => {
            info!("Loaded .env from: {}", path.display());
            Some(path)
        }
        Err(e) if e.not_found() => None,
        Err(e) => {
            warn!("Failed to parse .env: {e}");
            None
        }
    }
}

/// Read `config.json` and apply environment overrides.
///
/// The result is validated, so it can go straight into a client builder.
pub fn load_client_config(paths: &AppPaths) -> Result<ClientConfig, PresenceAppError> {
    let mut config = ClientConfig::load(&paths.config_dir).map_err(CoreError::from)?;

    if let Ok(client_id) = std::env::var(ENV_CLIENT_ID) {
        debug!("Client id taken from {ENV_CLIENT_ID}");
        config.client_id = client_id.trim().to_string();
    }

    if let Ok(index) = std::env::var(ENV_SOCKET_INDEX) {
        let index = index.trim().parse::<u8>().map_err(|e| PresenceAppError::App {
            message: format!("{ENV_SOCKET_INDEX}={index} is not a socket index: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;
        config.socket_index = Some(index);
    }

    config
        .validate()
        .map_err(CoreError::from)?;
    Ok(config)
}
