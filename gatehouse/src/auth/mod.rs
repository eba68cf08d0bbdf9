//! Authentication of the single protected principal
//!
//! Two modes, picked by `auth.mode`:
//!
//! - `credentials`: a shared username and an Argon2id password hash
//!   ([`CredentialVerifier`]).
//! - `github`: GitHub OAuth where exactly one account is authorized
//!   ([`oauth`]).

pub mod credentials;
pub mod oauth;
pub mod password;

use std::sync::Arc;

pub use credentials::CredentialVerifier;
pub use password::{PasswordHasher, PasswordParams};

use crate::config::{AuthConfig, AuthMode};
use crate::error::Result;
use oauth::{AuthorizedUser, GitHubProvider, OAuthProvider};

/// The configured login method
#[derive(Clone)]
pub enum Authenticator {
    /// Login form with the shared credential
    Credentials(CredentialVerifier),
    /// OAuth with one authorized identity
    OAuth {
        /// Identity provider
        provider: Arc<dyn OAuthProvider>,
        /// Holder of the authorized identity
        authorized: Arc<AuthorizedUser>,
    },
}

impl Authenticator {
    /// Build the authenticator selected by configuration
    pub async fn from_config(config: &AuthConfig) -> Result<Self> {
        match config.mode {
            AuthMode::Credentials => Ok(Self::Credentials(CredentialVerifier::from_config(config)?)),
            AuthMode::Github => {
                let provider = GitHubProvider::new(&config.github)?;
                let authorized = AuthorizedUser::load(&config.github.authorized_user_file).await;
                Ok(Self::OAuth {
                    provider: Arc::new(provider),
                    authorized: Arc::new(authorized),
                })
            }
        }
    }

    /// Mode this authenticator implements
    pub fn mode(&self) -> AuthMode {
        match self {
            Self::Credentials(_) => AuthMode::Credentials,
            Self::OAuth { .. } => AuthMode::Github,
        }
    }
}
