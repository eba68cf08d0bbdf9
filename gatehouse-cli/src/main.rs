use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;

mod commands;

use commands::access::AccessCommands;
use commands::config::ConfigCommands;

/// gatehouse - access-controlled single-tenant portal
#[derive(Parser)]
#[command(name = "gatehouse")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Load configuration from this file instead of the default search path
    #[arg(short, long, global = true, value_name = "FILE", env = "GATEHOUSE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the portal server
    Serve,
    /// Inspect or remove banned addresses
    Bans {
        #[command(subcommand)]
        command: AccessCommands,
    },
    /// Inspect or remove approved addresses
    Approvals {
        #[command(subcommand)]
        command: AccessCommands,
    },
    /// Hash a password for `auth.password_hash`
    HashPassword {
        /// Read the password from stdin instead of prompting
        #[arg(long)]
        stdin: bool,
    },
    /// Configuration helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Query the status endpoint of a running server
    Status {
        /// Base URL of the server (defaults to the configured port on localhost)
        #[arg(long, value_name = "URL")]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config_path = cli.config;

    let result = match cli.command {
        Commands::Serve => commands::serve::execute(config_path).await,
        Commands::Bans { command } => {
            commands::access::execute(gatehouse::store::AccessKind::Ban, command, config_path)
                .await
        }
        Commands::Approvals { command } => {
            commands::access::execute(
                gatehouse::store::AccessKind::Approval,
                command,
                config_path,
            )
            .await
        }
        Commands::HashPassword { stdin } => commands::password::execute(stdin).await,
        Commands::Config { command } => commands::config::execute(command, config_path).await,
        Commands::Status { url } => commands::status::execute(url, config_path).await,
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);

            if let Some(source) = e.source() {
                eprintln!("\n{} {}", "Caused by:".yellow(), source);
            }

            std::process::exit(1);
        }
    }
}
