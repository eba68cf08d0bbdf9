use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use gatehouse::store::{AccessKind, AccessRecord, AccessStore, FileAccessStore};

use super::load_config;

#[derive(Subcommand)]
pub enum AccessCommands {
    /// List records
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Remove the record for an address
    Remove {
        /// Client address, as shown by `list`
        #[arg(value_name = "ADDRESS")]
        address: String,
    },
}

pub async fn execute(
    kind: AccessKind,
    command: AccessCommands,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    let store = FileAccessStore::open(&config.store)
        .await
        .context("Failed to open the access store")?;

    match command {
        AccessCommands::List { json } => list(&store, kind, json).await,
        AccessCommands::Remove { address } => remove(&store, kind, &address).await,
    }
}

async fn list(store: &FileAccessStore, kind: AccessKind, json: bool) -> Result<()> {
    let records = store.list(kind).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("{}", format!("No {} records.", kind).dimmed());
        return Ok(());
    }

    println!(
        "{:<40} {:<20} {}",
        "ADDRESS".bold(),
        "SINCE".bold(),
        "DETAIL".bold()
    );
    for record in &records {
        println!(
            "{:<40} {:<20} {}",
            record.address(),
            record.time().format("%Y-%m-%d %H:%M:%S"),
            detail(record)
        );
    }
    println!("\n{} {} record(s)", records.len().to_string().cyan(), kind);
    Ok(())
}

fn detail(record: &AccessRecord) -> String {
    match record {
        AccessRecord::Ban(ban) => ban.client_signature.clone().unwrap_or_default(),
        AccessRecord::Approval(approval) => approval
            .identity
            .clone()
            .or_else(|| approval.client_signature.clone())
            .unwrap_or_default(),
    }
}

async fn remove(store: &FileAccessStore, kind: AccessKind, address: &str) -> Result<()> {
    if !store.remove(kind, address).await? {
        anyhow::bail!("No {} record for {}", kind, address);
    }

    println!("{} Removed {} record for {}", "✓".green(), kind, address.cyan());
    println!(
        "{}",
        "A running server still answers from its cached copy until it restarts or next writes this list."
            .yellow()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse::store::{ApprovalRecord, BanRecord};

    #[test]
    fn test_detail_prefers_identity() {
        let approval = AccessRecord::Approval(ApprovalRecord::new(
            "10.0.0.1",
            Some("curl/8".to_string()),
            Some("p4rge".to_string()),
        ));
        assert_eq!(detail(&approval), "p4rge");

        let ban = AccessRecord::Ban(BanRecord::new("10.0.0.2", Some("curl/8".to_string())));
        assert_eq!(detail(&ban), "curl/8");
    }

    #[tokio::test]
    async fn test_remove_rewrites_document() {
        let dir = tempfile::tempdir().unwrap();
        let bans = dir.path().join("ban.json");
        let approvals = dir.path().join("approvals.json");

        let store = FileAccessStore::open_paths(&bans, &approvals, true).await.unwrap();
        store.record_ban(BanRecord::new("10.0.0.5", None)).await.unwrap();

        remove(&store, AccessKind::Ban, "10.0.0.5").await.unwrap();
        assert!(remove(&store, AccessKind::Ban, "10.0.0.5").await.is_err());

        let reopened = FileAccessStore::open_paths(&bans, &approvals, true).await.unwrap();
        assert!(!reopened.is_banned("10.0.0.5").await.unwrap());
    }
}
