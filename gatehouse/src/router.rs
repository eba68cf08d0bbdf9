//! Route table and per-request middleware
//!
//! Layers from the outside in:
//!
//! 1. fault capture (writes the fault log for any internal-error response)
//! 2. panic recovery
//! 3. cookie sessions
//! 4. the request gate
//! 5. the body limit for uploads
//!
//! Transport layers (tracing, request ids, timeouts, CORS) are added by
//! [`Server`](crate::server::Server).

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;

use crate::fault::{capture_faults, panic_response};
use crate::gate::request_gate;
use crate::handlers::{auth, files, pages, status, subsystems};
use crate::session::create_session_layer;
use crate::state::AppState;

/// Build the portal router for the given state
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config().service.body_limit_mb * 1024 * 1024;
    let session_layer = create_session_layer(&state.config().session);
    let fault_log = Arc::clone(state.fault_log());

    Router::new()
        .route("/", get(pages::dashboard))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/oauth-callback", get(auth::oauth_callback))
        .route("/logout", post(auth::logout))
        .route("/status", get(status::status))
        .route("/stats", get(status::stats))
        .route("/files", get(pages::files))
        .route(
            "/files/{name}",
            get(files::download)
                .post(files::upload)
                .delete(files::delete),
        )
        .route("/notes", get(pages::notes))
        .route("/todos", get(pages::todos))
        .route("/subsystems", get(pages::subsystems))
        .route("/subsystems/{id}/start", post(subsystems::start))
        .route("/subsystems/{id}/stop", post(subsystems::stop))
        .route("/subsystems/{id}/status", get(subsystems::status))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn_with_state(state.clone(), request_gate))
        .layer(session_layer)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(from_fn_with_state(fault_log, capture_faults))
        .with_state(state)
}
