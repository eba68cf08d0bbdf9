//! Cookie sessions
//!
//! Sessions live in a process-lifetime memory store. The portal keeps four
//! keys in a session:
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `authenticated` | set to `true` by a successful login |
//! | `identity` | username or OAuth login |
//! | `login_time` | when the login happened |
//! | `oauth_state` | CSRF state issued by the login page (github mode) |

use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{DateTime, Utc};
use time::Duration;
use tower_sessions::{cookie::SameSite, Expiry, SessionManagerLayer};
use tower_sessions_memory_store::MemoryStore;

pub use tower_sessions::Session;

use crate::config::SessionConfig;
use crate::error::{Error, Result};

const AUTHENTICATED_KEY: &str = "authenticated";
const IDENTITY_KEY: &str = "identity";
const LOGIN_TIME_KEY: &str = "login_time";
const OAUTH_STATE_KEY: &str = "oauth_state";

/// Create the session layer from configuration
pub fn create_session_layer(config: &SessionConfig) -> SessionManagerLayer<MemoryStore> {
    let expiry = if config.expiry_secs == 0 {
        Expiry::OnSessionEnd
    } else {
        Expiry::OnInactivity(Duration::seconds(config.expiry_secs as i64))
    };

    let same_site = match config.same_site.to_lowercase().as_str() {
        "strict" => SameSite::Strict,
        "none" => SameSite::None,
        _ => SameSite::Lax,
    };

    SessionManagerLayer::new(MemoryStore::default())
        .with_name(config.cookie_name.clone())
        .with_expiry(expiry)
        .with_secure(config.secure)
        .with_http_only(true)
        .with_same_site(same_site)
        .with_path("/")
}

/// Authenticated principal stored in a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLogin {
    /// Username or OAuth login
    pub identity: String,
    /// When the session authenticated
    pub login_time: DateTime<Utc>,
}

/// Extractor for the request's session
///
/// Fails with [`Error::Session`] when the session layer is missing.
pub struct PortalSession(pub Session);

impl<S> FromRequestParts<S> for PortalSession
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .map(PortalSession)
            .ok_or_else(|| Error::Session("Session layer not installed".to_string()))
    }
}

/// Session attached to a request, if the session layer ran
pub fn from_extensions(extensions: &axum::http::Extensions) -> Option<Session> {
    extensions.get::<Session>().cloned()
}

/// Read the authenticated principal, if the session holds one
pub async fn current_login(session: &Session) -> Result<Option<SessionLogin>> {
    let authenticated: Option<bool> = session.get(AUTHENTICATED_KEY).await?;
    if authenticated != Some(true) {
        return Ok(None);
    }

    let identity: Option<String> = session.get(IDENTITY_KEY).await?;
    let login_time: Option<DateTime<Utc>> = session.get(LOGIN_TIME_KEY).await?;
    Ok(Some(SessionLogin {
        identity: identity.unwrap_or_default(),
        login_time: login_time.unwrap_or_else(Utc::now),
    }))
}

/// Mark the session authenticated
///
/// The session id is cycled first so a pre-login id cannot be fixed by an
/// attacker.
pub async fn sign_in(session: &Session, identity: &str) -> Result<SessionLogin> {
    session.cycle_id().await?;
    let login_time = Utc::now();
    session.insert(AUTHENTICATED_KEY, true).await?;
    session.insert(IDENTITY_KEY, identity).await?;
    session.insert(LOGIN_TIME_KEY, login_time).await?;
    Ok(SessionLogin {
        identity: identity.to_string(),
        login_time,
    })
}

/// Clear the session and expire its cookie
pub async fn sign_out(session: &Session) -> Result<()> {
    session.flush().await?;
    Ok(())
}

/// Store a freshly issued OAuth state
pub async fn store_oauth_state(session: &Session, state: &str) -> Result<()> {
    session.insert(OAUTH_STATE_KEY, state).await?;
    Ok(())
}

/// Remove and return the issued OAuth state; it is single use
pub async fn take_oauth_state(session: &Session) -> Result<Option<String>> {
    Ok(session.remove(OAUTH_STATE_KEY).await?)
}

/// Session id as a string, once the session has one
pub fn session_id(session: &Session) -> Option<String> {
    session.id().map(|id| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_fresh_session_is_anonymous() {
        assert!(current_login(&session()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_and_out() {
        let session = session();
        let login = sign_in(&session, "p4rge").await.unwrap();

        let current = current_login(&session).await.unwrap().unwrap();
        assert_eq!(current, login);

        sign_out(&session).await.unwrap();
        assert!(current_login(&session).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oauth_state_is_single_use() {
        let session = session();
        store_oauth_state(&session, "abc").await.unwrap();
        assert_eq!(take_oauth_state(&session).await.unwrap().as_deref(), Some("abc"));
        assert!(take_oauth_state(&session).await.unwrap().is_none());
    }

    #[test]
    fn test_layer_from_config() {
        // Construction must not panic for any same-site spelling
        for same_site in ["strict", "LAX", "none", "bogus"] {
            let config = SessionConfig {
                same_site: same_site.to_string(),
                ..Default::default()
            };
            let _ = create_session_layer(&config);
        }
    }
}
