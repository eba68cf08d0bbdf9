//! File download, upload, and deletion

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};

use crate::collab::FileEntry;
use crate::error::{Error, Result};
use crate::gate::ClientAddress;
use crate::state::AppState;

/// `GET /files/{name}`
pub async fn download(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response> {
    let contents = state.files().read(&name).await?;
    let disposition = format!("attachment; filename=\"{}\"", name.replace('"', ""));
    Ok((
        [
            (CONTENT_TYPE, "application/octet-stream".to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        contents,
    )
        .into_response())
}

/// `POST /files/{name}` with the raw file as the body
pub async fn upload(
    State(state): State<AppState>,
    address: ClientAddress,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<FileEntry>)> {
    let entry = state.files().save(&name, body).await?;
    tracing::info!(address = %address, file = %entry.name, size = entry.size, "File uploaded");
    Ok((StatusCode::CREATED, Json(entry)))
}

/// `DELETE /files/{name}`
pub async fn delete(
    State(state): State<AppState>,
    address: ClientAddress,
    Path(name): Path<String>,
) -> Result<StatusCode> {
    if !state.files().delete(&name).await? {
        return Err(Error::NotFound(format!("No file named {}", name)));
    }
    tracing::info!(address = %address, file = %name, "File deleted");
    Ok(StatusCode::NO_CONTENT)
}
