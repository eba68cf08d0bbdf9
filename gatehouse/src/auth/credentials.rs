//! Shared credential check for the login form

use std::sync::Arc;

use super::password::{validate_hash, PasswordHasher};
use crate::config::AuthConfig;
use crate::error::{Error, Result};

/// Verifies the single shared username/password pair
#[derive(Clone)]
pub struct CredentialVerifier {
    username: String,
    password_hash: Arc<str>,
    hasher: PasswordHasher,
}

impl std::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVerifier")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl CredentialVerifier {
    /// Create a verifier, rejecting an empty username or malformed hash
    pub fn new(
        username: impl Into<String>,
        password_hash: impl Into<String>,
        hasher: PasswordHasher,
    ) -> Result<Self> {
        let username = username.into();
        let password_hash = password_hash.into();

        if username.is_empty() {
            return Err(Error::InvalidConfig(
                "auth.username is required in credentials mode".to_string(),
            ));
        }
        if password_hash.is_empty() {
            return Err(Error::InvalidConfig(
                "auth.password_hash is required in credentials mode (see `gatehouse hash-password`)"
                    .to_string(),
            ));
        }
        validate_hash(&password_hash)?;

        Ok(Self {
            username,
            password_hash: password_hash.into(),
            hasher,
        })
    }

    /// Create a verifier from the auth configuration
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        Self::new(
            config.username.clone(),
            config.password_hash.clone(),
            PasswordHasher::default(),
        )
    }

    /// The configured username
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Check a submitted credential pair
    ///
    /// The hash is always verified, even for a wrong username, so response
    /// time does not reveal which half was wrong. Argon2 runs on the blocking
    /// pool.
    pub async fn verify(&self, username: &str, password: &str) -> Result<bool> {
        let hasher = self.hasher.clone();
        let hash = Arc::clone(&self.password_hash);
        let password = password.to_string();

        let password_ok = tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| Error::Internal(format!("Password verification task failed: {}", e)))??;

        Ok(password_ok && username == self.username)
    }
}
