//! Request gate
//!
//! Every request passes through [`request_gate`] before it reaches a handler.
//! The steps run in a fixed order:
//!
//! 1. Resolve the client address.
//! 2. Banned addresses are redirected to the ban destination. Nothing else
//!    runs for them, not even the tracker.
//! 3. Classify the route as public or protected.
//! 4. Determine the principal from the session, or from an approval record
//!    when `auth.trust_approved_addresses` is set.
//! 5. Record the request in the tracker.
//! 6. Protected routes without a principal are redirected to `/login`.
//! 7. Everything else is dispatched with [`ClientAddress`] and the optional
//!    [`Principal`] in the request extensions.

pub mod address;
pub mod policy;

use axum::{
    extract::{Request, State},
    http::{header::LOCATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};

pub use address::{ClientAddress, UNKNOWN_ADDRESS};
pub use policy::{RouteClass, RoutePolicy};

use crate::auth::Authenticator;
use crate::session;
use crate::state::AppState;

/// Path unauthenticated requests are sent to
pub const LOGIN_PATH: &str = "/login";

/// Who the request is acting as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Username or OAuth login
    pub identity: String,
    /// When the principal logged in
    pub login_time: DateTime<Utc>,
}

/// 302 Found with a `Location` header
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

/// Gate middleware; install with `axum::middleware::from_fn_with_state`
///
/// Must run inside the session layer so the session is in the extensions.
pub async fn request_gate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let config = state.config();
    let address = address::resolve(
        request.extensions(),
        request.headers(),
        config.service.trust_forwarded_for,
    );
    let security = state.security();

    if security.lockout().is_banned(&address).await {
        tracing::debug!(address = %address, "Banned address redirected");
        return found(&config.lockout.ban_redirect);
    }

    let path = request.uri().path().to_string();
    let class = RoutePolicy::new(config.stats.public).classify(&path);
    let session = session::from_extensions(request.extensions());
    // Loading an expired record resets the id, so take the cookie's id first
    let session_id = session.as_ref().and_then(session::session_id);

    let session_principal = match &session {
        Some(session) => match session::current_login(session).await {
            Ok(login) => login.map(|login| Principal {
                identity: login.identity,
                login_time: login.login_time,
            }),
            Err(e) => {
                tracing::warn!(address = %address, error = %e, "Session lookup failed");
                None
            }
        },
        None => None,
    };
    let signed_in = session_principal.is_some();

    let mut principal = session_principal;
    if principal.is_none() && config.auth.trust_approved_addresses {
        if let Authenticator::Credentials(verifier) = state.authenticator() {
            if security.is_approved(&address).await {
                principal = Some(Principal {
                    identity: verifier.username().to_string(),
                    login_time: Utc::now(),
                });
            }
        }
    }

    let tracker = security.tracker();
    tracker.record_request(&address, &path, Utc::now());
    // Only a signed-in session is listed; an expired or anonymous one is dropped
    if let (Some(session_id), false) = (&session_id, signed_in) {
        tracker.clear_session(session_id);
    }
    if let Some(principal) = &principal {
        tracker.record_authenticated(
            session_id.as_deref().filter(|_| signed_in),
            &address,
            &principal.identity,
            principal.login_time,
            &path,
        );
    }

    if class == RouteClass::Protected && principal.is_none() {
        return found(LOGIN_PATH);
    }

    request.extensions_mut().insert(ClientAddress(address));
    request.extensions_mut().insert(principal);
    next.run(request).await
}
