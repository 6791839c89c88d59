use presence::error::PresenceAppError;
use presence::logger::initialize as LoggerInitialize;
use presence::session::{
    CONNECT_MAX_ELAPSED, LoggingListener, SUPERVISE_INTERVAL, app_error, connect_with_backoff,
    sample_activity, supervise,
};
use presence::settings::{load_client_config, resolve_paths, try_load_dotenv};

use presence_core::{CoreError, PresenceClientBuilder};

use std::fs::create_dir_all;
use std::process::ExitCode;
use std::sync::Arc;

use log::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), PresenceAppError> {
    let paths = resolve_paths()?;

    create_dir_all(&paths.log_dir)
        .map_err(|e| app_error(format!("Failed to create log directory: {e}")))?;

    // Initialize logger FIRST
    LoggerInitialize(&paths.log_dir)?;

    info!("Presence starting");
    info!("Config directory: {}", paths.config_dir.display());
    info!("Log directory: {}", paths.log_dir.display());

    try_load_dotenv();
    let config = load_client_config(&paths)?;

    let client = PresenceClientBuilder::from_config(config)
        .with_listener(Arc::new(LoggingListener))
        .build()?;

    let project = std::env::current_dir()
        .ok()
        .and_then(|dir| dir.file_name().map(|name| name.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "presence".to_string());
    let activity = sample_activity(&project).map_err(CoreError::from)?;

    // Stored now, published on READY
    client.update_activity(Some(activity))?;

    if let Err(e) = connect_with_backoff(&client, CONNECT_MAX_ELAPSED).await {
        warn!("{e}");
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
        }
    };
    supervise(&client, SUPERVISE_INTERVAL, shutdown).await;

    info!("Shutting down");
    client.shutdown().await;
    Ok(())
}
