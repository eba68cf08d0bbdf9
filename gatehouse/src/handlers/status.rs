//! Status and stats endpoints

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::stats::DeviceUsage;
use crate::state::AppState;
use crate::tracker::{ConnectionLogEntry, SessionEntry, VerifiedAddressEntry};

/// Liveness probe body
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Always `online`
    pub status: String,
    /// Host address
    pub ip: String,
    /// Listening port
    pub port: u16,
}

/// Introspection body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    /// Seconds since startup
    pub uptime: u64,
    /// Current server time
    pub server_time: DateTime<Utc>,
    /// Host address
    pub ip: String,
    /// Listening port
    pub port: u16,
    /// Authenticated sessions
    pub connected_users: Vec<SessionEntry>,
    /// Connection log tail, oldest first
    pub connections: Vec<ConnectionLogEntry>,
    /// Banned addresses
    #[serde(rename = "bannedIPs")]
    pub banned_ips: Vec<String>,
    /// Addresses that authenticated since startup
    #[serde(rename = "verifiedIPs")]
    pub verified_ips: Vec<VerifiedAddressEntry>,
    /// Host resource usage
    pub device_usage: DeviceUsage,
}

/// `GET /status`
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "online".to_string(),
        ip: state.host().to_string(),
        port: state.config().service.port,
    })
}

/// `GET /stats`
pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let snapshot = state
        .security()
        .snapshot(state.config().tracker.stats_tail)
        .await?;

    Ok(Json(StatsResponse {
        uptime: state.uptime().as_secs(),
        server_time: Utc::now(),
        ip: state.host().to_string(),
        port: state.config().service.port,
        connected_users: snapshot.tracker.sessions,
        connections: snapshot.tracker.connections,
        banned_ips: snapshot.banned,
        verified_ips: snapshot.tracker.verified,
        device_usage: state.metrics().sample(),
    }))
}
