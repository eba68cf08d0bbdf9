//! Subsystem start, stop, and status

use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};

use crate::collab::{Page, SubsystemStatus};
use crate::error::Result;
use crate::gate::{found, ClientAddress};
use crate::state::AppState;

/// `POST /subsystems/{id}/start`
pub async fn start(
    State(state): State<AppState>,
    address: ClientAddress,
    Path(id): Path<String>,
) -> Result<Response> {
    let status = state.subsystems().start(&id).await?;
    tracing::info!(address = %address, subsystem = %id, pid = ?status.pid, "Subsystem started");
    Ok(found(Page::Subsystems.path()))
}

/// `POST /subsystems/{id}/stop`
pub async fn stop(
    State(state): State<AppState>,
    address: ClientAddress,
    Path(id): Path<String>,
) -> Result<Response> {
    let status = state.subsystems().stop(&id).await?;
    tracing::info!(
        address = %address,
        subsystem = %id,
        exit_code = ?status.exit_code,
        "Subsystem stopped"
    );
    Ok(found(Page::Subsystems.path()))
}

/// `GET /subsystems/{id}/status`
pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SubsystemStatus>> {
    Ok(Json(state.subsystems().status(&id).await?))
}
