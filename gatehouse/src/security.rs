//! Security context
//!
//! Owns every piece of access-control state: the ban/approval store, the
//! lockout counters, and the session/connection tracker. Constructed once at
//! startup and shared by handle with the gate and the handlers.

use std::sync::Arc;

use serde::Serialize;

use crate::config::Config;
use crate::error::Result;
use crate::lockout::LoginLockout;
use crate::store::{AccessStore, FileAccessStore};
use crate::tracker::{ConnectionTracker, TrackerSnapshot};

/// Tracker state plus the ban set, for the stats endpoint
#[derive(Debug, Clone, Serialize)]
pub struct SecuritySnapshot {
    /// Connection log tail, sessions, verified addresses
    #[serde(flatten)]
    pub tracker: TrackerSnapshot,
    /// Banned addresses
    pub banned: Vec<String>,
}

/// Security context shared by the gate and the handlers
pub struct SecurityContext {
    store: Arc<dyn AccessStore>,
    lockout: LoginLockout,
    tracker: ConnectionTracker,
}

impl SecurityContext {
    /// Assemble a context around an existing store
    pub fn new(config: &Config, store: Arc<dyn AccessStore>) -> Self {
        Self {
            lockout: LoginLockout::new(config.lockout.clone(), Arc::clone(&store)),
            tracker: ConnectionTracker::from_config(&config.tracker)
                .with_session_idle(config.session.idle_limit()),
            store,
        }
    }

    /// Open the file-backed store named by the configuration and assemble a context
    pub async fn open(config: &Config) -> Result<Self> {
        let store = FileAccessStore::open(&config.store).await?;
        Ok(Self::new(config, Arc::new(store)))
    }

    /// Ban/approval store
    pub fn store(&self) -> &Arc<dyn AccessStore> {
        &self.store
    }

    /// Lockout state machine
    pub fn lockout(&self) -> &LoginLockout {
        &self.lockout
    }

    /// Session/connection tracker
    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Whether the address holds an approval record; store errors read as "no"
    pub async fn is_approved(&self, address: &str) -> bool {
        match self.store.is_approved(address).await {
            Ok(approved) => approved,
            Err(e) => {
                tracing::warn!(address = address, error = %e, "Approval lookup failed");
                false
            }
        }
    }

    /// Tracker snapshot with the current ban set
    pub async fn snapshot(&self, tail: usize) -> Result<SecuritySnapshot> {
        let banned = self.store.banned_addresses().await?;
        Ok(SecuritySnapshot {
            tracker: self.tracker.snapshot(tail),
            banned,
        })
    }

    /// Flush durable state; called once at shutdown
    pub async fn shutdown(&self) -> Result<()> {
        self.store.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryAccessStore;
    use chrono::Utc;

    #[tokio::test]
    async fn test_snapshot_includes_bans() {
        let context = SecurityContext::new(&Config::default(), Arc::new(MemoryAccessStore::new()));
        context.tracker().record_request("10.0.0.1", "/", Utc::now());
        context.lockout().ban("10.0.0.9", None).await.unwrap();

        let snapshot = context.snapshot(100).await.unwrap();
        assert_eq!(snapshot.banned, vec!["10.0.0.9"]);
        assert_eq!(snapshot.tracker.connections.len(), 1);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("connections").is_some());
        assert!(json.get("banned").is_some());
    }

    #[tokio::test]
    async fn test_open_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.store.dir = dir.path().to_path_buf();

        let context = SecurityContext::open(&config).await.unwrap();
        context.lockout().ban("10.0.0.5", None).await.unwrap();
        context.shutdown().await.unwrap();
        assert!(dir.path().join("ban.json").exists());
    }
}
