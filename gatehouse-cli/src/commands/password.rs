use std::io::BufRead;

use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::Password;
use gatehouse::auth::PasswordHasher;

pub async fn execute(stdin: bool) -> Result<()> {
    let hasher = PasswordHasher::default();

    let password = if stdin {
        read_stdin()?
    } else {
        Password::new()
            .with_prompt("Portal password")
            .with_confirmation("Repeat password", "Passwords do not match")
            .validate_with(|input: &String| -> std::result::Result<(), String> {
                if input.len() < hasher.min_password_length() {
                    Err(format!(
                        "Password must be at least {} characters",
                        hasher.min_password_length()
                    ))
                } else {
                    Ok(())
                }
            })
            .interact()
            .context("Failed to read password")?
    };

    let hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .context("Hashing task failed")??;

    if stdin {
        println!("{}", hash);
    } else {
        println!("\n{}", "Add this to the [auth] section of config.toml:".bold());
        println!("password_hash = \"{}\"", hash);
    }
    Ok(())
}

fn read_stdin() -> Result<String> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
