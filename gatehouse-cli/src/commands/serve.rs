use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use gatehouse::fault::{FaultLog, FaultRecord};
use gatehouse::observability::init_tracing;
use gatehouse::server::Server;
use gatehouse::{AppState, Config};

use super::load_config;

pub async fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    init_tracing(&config).context("Failed to initialize tracing")?;

    let fault_log = Arc::new(FaultLog::from_config(&config.fault_log));
    let result = run(config, Arc::clone(&fault_log)).await;

    // A fault that ends the server goes to the fault log, then the process exits 1
    if let Err(e) = &result {
        if let Err(log_err) = fault_log.record(&FaultRecord::process(e.to_string())).await {
            tracing::warn!(error = %log_err, "Failed to write fault log");
        }
    }

    result.context("Server terminated")
}

async fn run(config: Config, fault_log: Arc<FaultLog>) -> gatehouse::Result<()> {
    let state = AppState::builder(config).fault_log(fault_log).build().await?;
    Server::new(state).serve().await
}
