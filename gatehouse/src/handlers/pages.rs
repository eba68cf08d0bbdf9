//! Protected HTML pages

use axum::{extract::State, response::Html, Extension};

use crate::collab::{Page, PageContext};
use crate::error::Result;
use crate::gate::Principal;
use crate::state::AppState;

/// Page context for a gated request
pub(crate) fn context(page: Page, principal: &Option<Principal>) -> PageContext {
    PageContext::new(page).with_identity(principal.as_ref().map(|p| p.identity.clone()))
}

/// `GET /`
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(principal): Extension<Option<Principal>>,
) -> Result<Html<String>> {
    Ok(Html(state.renderer().render(&context(Page::Dashboard, &principal))?))
}

/// `GET /notes`
pub async fn notes(
    State(state): State<AppState>,
    Extension(principal): Extension<Option<Principal>>,
) -> Result<Html<String>> {
    Ok(Html(state.renderer().render(&context(Page::Notes, &principal))?))
}

/// `GET /todos`
pub async fn todos(
    State(state): State<AppState>,
    Extension(principal): Extension<Option<Principal>>,
) -> Result<Html<String>> {
    Ok(Html(state.renderer().render(&context(Page::Todos, &principal))?))
}

/// `GET /files`
pub async fn files(
    State(state): State<AppState>,
    Extension(principal): Extension<Option<Principal>>,
) -> Result<Html<String>> {
    let files = state.files().list().await?;
    let context = context(Page::Files, &principal).with_files(files);
    Ok(Html(state.renderer().render(&context)?))
}

/// `GET /subsystems`
pub async fn subsystems(
    State(state): State<AppState>,
    Extension(principal): Extension<Option<Principal>>,
) -> Result<Html<String>> {
    let subsystems = state.subsystems().list().await?;
    let context = context(Page::Subsystems, &principal).with_subsystems(subsystems);
    Ok(Html(state.renderer().render(&context)?))
}
