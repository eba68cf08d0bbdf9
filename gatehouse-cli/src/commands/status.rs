use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use gatehouse::handlers::StatusResponse;

use super::load_config;

pub async fn execute(url: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let base = match url {
        Some(url) => url,
        None => {
            let config = load_config(config_path.as_deref())?;
            format!("http://127.0.0.1:{}", config.service.port)
        }
    };
    let endpoint = status_url(&base);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .context("Failed to build HTTP client")?;

    let response = client
        .get(&endpoint)
        .send()
        .await
        .with_context(|| format!("No response from {}", endpoint))?;

    if response.status().is_redirection() {
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        anyhow::bail!("{} redirected to {} (is this address banned?)", endpoint, location);
    }
    if !response.status().is_success() {
        anyhow::bail!("{} answered {}", endpoint, response.status());
    }

    let status: StatusResponse = response
        .json()
        .await
        .context("Unexpected status response body")?;

    println!(
        "{} {} at {}:{}",
        "●".green(),
        status.status.green().bold(),
        status.ip.cyan(),
        status.port
    );
    Ok(())
}

fn status_url(base: &str) -> String {
    format!("{}/status", base.trim_end_matches('/'))
}
