//! The single authorized OAuth identity
//!
//! Persisted as `{"login": ..., "userInfo": {...}}`. While the document is
//! absent, the first successful OAuth login claims the portal.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::provider::OAuthUserInfo;
use crate::error::Result;
use crate::store::write_document;

/// Document format of the authorized identity file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizedUserRecord {
    /// Provider account handle
    pub login: String,
    /// Provider profile captured when the identity was claimed
    #[serde(default)]
    pub user_info: serde_json::Value,
}

/// Outcome of matching a provider identity against the authorized one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityMatch {
    /// No identity was authorized yet; this one now is
    Claimed,
    /// The identity is the authorized one
    Matched,
    /// Someone else
    Mismatch,
}

/// Holder of the authorized identity, cached in memory
pub struct AuthorizedUser {
    path: PathBuf,
    current: RwLock<Option<AuthorizedUserRecord>>,
}

impl AuthorizedUser {
    /// Load the authorized identity
    ///
    /// A missing or unreadable document means nobody is authorized yet.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<AuthorizedUserRecord>(&bytes) {
                Ok(record) if !record.login.is_empty() => Some(record),
                Ok(_) => None,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Authorized user file unreadable, treating as absent");
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Authorized user file unreadable, treating as absent");
                None
            }
        };

        if let Some(record) = &current {
            info!(login = %record.login, "Authorized identity loaded");
        } else {
            info!(path = %path.display(), "No authorized identity yet, first login will claim it");
        }

        Self {
            path,
            current: RwLock::new(current),
        }
    }

    /// Path of the identity document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Login of the authorized identity, if any
    pub async fn login(&self) -> Option<String> {
        self.current.read().await.as_ref().map(|r| r.login.clone())
    }

    /// Match an identity, claiming the portal for it when nobody holds it
    ///
    /// The claim and the match happen under one write lock, so two racing
    /// first logins cannot both claim.
    pub async fn match_or_claim(&self, user: &OAuthUserInfo) -> Result<IdentityMatch> {
        let mut current = self.current.write().await;

        if let Some(record) = current.as_ref() {
            return Ok(if record.login == user.login {
                IdentityMatch::Matched
            } else {
                IdentityMatch::Mismatch
            });
        }

        let record = AuthorizedUserRecord {
            login: user.login.clone(),
            user_info: user.raw.clone(),
        };
        write_document(&self.path, &record).await?;
        info!(login = %record.login, "Authorized identity claimed by first login");
        *current = Some(record);
        Ok(IdentityMatch::Claimed)
    }
}
