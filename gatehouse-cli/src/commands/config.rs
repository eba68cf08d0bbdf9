use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use gatehouse::Config;

use super::load_config;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a config.toml with every default spelled out
    Init {
        /// Destination (defaults to ~/.config/gatehouse/config.toml)
        #[arg(long, value_name = "FILE")]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration after all sources are merged
    Show,
}

pub async fn execute(command: ConfigCommands, config_path: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommands::Init { path, force } => init(path, force),
        ConfigCommands::Show => show(config_path),
    }
}

fn init(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = path.unwrap_or_else(Config::recommended_path);
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(&path, default_toml()?)
        .with_context(|| format!("Failed to write file: {}", path.display()))?;

    println!("{} Wrote {}", "✓".green(), path.display().to_string().cyan());
    println!(
        "  Set {} and {} before starting the server.",
        "auth.username".bold(),
        "auth.password_hash".bold()
    );
    println!("  {}", "gatehouse hash-password".dimmed());
    Ok(())
}

fn show(config_path: Option<PathBuf>) -> Result<()> {
    let mut config = load_config(config_path.as_deref())?;
    if !config.auth.password_hash.is_empty() {
        config.auth.password_hash = "<redacted>".to_string();
    }
    if !config.auth.github.client_secret.is_empty() {
        config.auth.github.client_secret = "<redacted>".to_string();
    }
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn default_toml() -> Result<String> {
    toml::to_string_pretty(&Config::default()).context("Failed to serialize default configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_toml_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        init(Some(path.clone()), false).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("threshold = 3"));
        assert!(text.contains("ban_redirect = \"https://www.google.com\""));

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.lockout.threshold, 3);
        assert_eq!(config.service.port, 4000);
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();

        assert!(init(Some(path.clone()), false).is_err());
        assert!(init(Some(path), true).is_ok());
    }
}
