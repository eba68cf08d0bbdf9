//! Login, OAuth callback, and logout handlers
//!
//! These run after the gate, so a banned address never reaches them. The
//! lockout decides what a credential check turns into; the handlers only map
//! its outcome onto a response.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Form,
};
use serde::Deserialize;

use crate::auth::oauth::{generate_state, resolve_identity, state_matches, IdentityMatch};
use crate::auth::Authenticator;
use crate::collab::{Page, PageContext};
use crate::error::{Error, Result};
use crate::gate::{address::user_agent, found, ClientAddress, LOGIN_PATH};
use crate::lockout::LoginOutcome;
use crate::session::{self, PortalSession};
use crate::state::AppState;

/// Credential login form
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    /// Submitted username
    #[serde(default)]
    pub username: String,
    /// Submitted password
    #[serde(default)]
    pub password: String,
}

/// Query string of the OAuth redirect
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    /// Authorization code
    pub code: Option<String>,
    /// Echoed state
    pub state: Option<String>,
}

fn authentication_failed() -> Error {
    Error::Unauthorized("Authentication failed".to_string())
}

/// `GET /login`
///
/// Credentials mode renders the form. OAuth mode issues a fresh state and
/// renders a link to the provider.
pub async fn login_page(
    State(state): State<AppState>,
    PortalSession(session): PortalSession,
) -> Result<Html<String>> {
    let mut context = PageContext::new(Page::Login);

    if let Authenticator::OAuth { provider, .. } = state.authenticator() {
        let oauth_state = generate_state();
        session::store_oauth_state(&session, &oauth_state).await?;
        context = context.with_login_url(provider.authorization_url(&oauth_state));
    }

    Ok(Html(state.renderer().render(&context)?))
}

/// `POST /login`
pub async fn login(
    State(state): State<AppState>,
    address: ClientAddress,
    PortalSession(session): PortalSession,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let Authenticator::Credentials(verifier) = state.authenticator() else {
        return Err(Error::NotFound("Credential login is not enabled".to_string()));
    };

    let lockout = state.security().lockout();
    let signature = user_agent(&headers);
    let accepted = verifier.verify(&form.username, &form.password).await?;

    let outcome = if accepted {
        lockout
            .record_success(address.as_str(), signature, Some(verifier.username().to_string()))
            .await?
    } else {
        lockout.record_failure(address.as_str(), signature).await?
    };

    match outcome {
        LoginOutcome::Approved { .. } => {
            session::sign_in(&session, verifier.username()).await?;
            tracing::info!(address = %address, identity = verifier.username(), "Login succeeded");
            Ok(found("/"))
        }
        LoginOutcome::Retry { attempt, threshold } => {
            let context = PageContext::new(Page::Login).with_message(format!(
                "Login failed! Attempt {} of {}.",
                attempt, threshold
            ));
            Ok((
                StatusCode::UNAUTHORIZED,
                Html(state.renderer().render(&context)?),
            )
                .into_response())
        }
        LoginOutcome::Banned => Ok(found(&lockout.config().ban_redirect)),
    }
}

/// `GET /oauth-callback`
///
/// A missing or mismatched state, a provider failure, or a timeout answers
/// 401 and leaves the session anonymous. An identity other than the
/// authorized one bans the requesting address.
pub async fn oauth_callback(
    State(state): State<AppState>,
    address: ClientAddress,
    PortalSession(session): PortalSession,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<Response> {
    let Authenticator::OAuth {
        provider,
        authorized,
    } = state.authenticator()
    else {
        return Err(Error::NotFound("OAuth login is not enabled".to_string()));
    };

    let issued = session::take_oauth_state(&session).await?;
    if !state_matches(issued.as_deref(), params.state.as_deref()) {
        tracing::warn!(address = %address, "OAuth callback with missing or mismatched state");
        return Err(authentication_failed());
    }

    let code = params
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(authentication_failed)?;

    let timeout = state.config().auth.github.timeout();
    let user = match resolve_identity(provider.as_ref(), &code, timeout).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!(address = %address, error = %e, "OAuth identity resolution failed");
            return Err(authentication_failed());
        }
    };

    let lockout = state.security().lockout();
    let signature = user_agent(&headers);

    match authorized.match_or_claim(&user).await? {
        IdentityMatch::Mismatch => {
            tracing::warn!(
                address = %address,
                login = %user.login,
                "OAuth identity does not match the authorized identity"
            );
            lockout.ban(address.as_str(), signature).await?;
            Ok(found(&lockout.config().ban_redirect))
        }
        IdentityMatch::Claimed | IdentityMatch::Matched => {
            let outcome = lockout
                .record_success(address.as_str(), signature, Some(user.login.clone()))
                .await?;
            if outcome == LoginOutcome::Banned {
                return Ok(found(&lockout.config().ban_redirect));
            }
            session::sign_in(&session, &user.login).await?;
            tracing::info!(address = %address, login = %user.login, "OAuth login succeeded");
            Ok(found("/"))
        }
    }
}

/// `POST /logout`
pub async fn logout(
    State(state): State<AppState>,
    PortalSession(session): PortalSession,
) -> Result<Response> {
    if let Some(session_id) = session::session_id(&session) {
        state.security().tracker().clear_session(&session_id);
    }
    session::sign_out(&session).await?;
    Ok(found(LOGIN_PATH))
}
