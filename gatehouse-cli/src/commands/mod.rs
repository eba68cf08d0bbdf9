use std::path::Path;

use anyhow::{Context, Result};
use gatehouse::Config;

pub mod access;
pub mod config;
pub mod password;
pub mod serve;
pub mod status;

/// Load configuration from an explicit file or the default search path
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Config::load().context("Failed to load configuration"),
    }
}
