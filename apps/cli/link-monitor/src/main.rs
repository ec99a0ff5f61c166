use link_monitor::error::MonitorError;
use link_monitor::logger::initialize as LoggerInitialize;
use link_monitor::monitor::{MonitorPaths, run};

use link_core::config::{ClientConfig, load_dotenv};

use std::fs::create_dir_all;
use std::process::ExitCode;

use log::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    match start().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("{}", e.to_json());
            ExitCode::FAILURE
        }
    }
}

async fn start() -> Result<(), MonitorError> {
    let paths = MonitorPaths::resolve()?;

    create_dir_all(&paths.log_dir).map_err(|e| {
        MonitorError::monitor(format!("Failed to create log directory: {e}"))
    })?;

    // Initialize logger FIRST
    LoggerInitialize(&paths.log_dir)?;

    info!("Link monitor starting");
    info!("Log directory: {}", paths.log_dir.display());

    load_dotenv();

    let mut config = ClientConfig::load(&paths.config_dir).map_err(MonitorError::core)?;
    config.apply_env_overrides().map_err(MonitorError::core)?;

    run(config).await
}
