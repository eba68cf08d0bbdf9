//! In-memory backend for the access store

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{AccessKind, AccessRecord, AccessStore, ApprovalRecord, BanRecord};
use crate::error::Result;

/// Access store that lives only as long as the process
#[derive(Default)]
pub struct MemoryAccessStore {
    bans: RwLock<Vec<BanRecord>>,
    approvals: RwLock<Vec<ApprovalRecord>>,
}

impl MemoryAccessStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccessStore for MemoryAccessStore {
    async fn is_banned(&self, address: &str) -> Result<bool> {
        Ok(self.bans.read().await.iter().any(|b| b.address == address))
    }

    async fn is_approved(&self, address: &str) -> Result<bool> {
        Ok(self
            .approvals
            .read()
            .await
            .iter()
            .any(|a| a.address == address))
    }

    async fn record_ban(&self, record: BanRecord) -> Result<bool> {
        let mut bans = self.bans.write().await;
        if bans.iter().any(|b| b.address == record.address) {
            return Ok(false);
        }
        bans.push(record);
        Ok(true)
    }

    async fn record_approval(&self, record: ApprovalRecord) -> Result<bool> {
        let mut approvals = self.approvals.write().await;
        if approvals.iter().any(|a| a.address == record.address) {
            return Ok(false);
        }
        approvals.push(record);
        Ok(true)
    }

    async fn list(&self, kind: AccessKind) -> Result<Vec<AccessRecord>> {
        Ok(match kind {
            AccessKind::Ban => self
                .bans
                .read()
                .await
                .iter()
                .cloned()
                .map(AccessRecord::Ban)
                .collect(),
            AccessKind::Approval => self
                .approvals
                .read()
                .await
                .iter()
                .cloned()
                .map(AccessRecord::Approval)
                .collect(),
        })
    }

    async fn remove(&self, kind: AccessKind, address: &str) -> Result<bool> {
        let removed = match kind {
            AccessKind::Ban => {
                let mut bans = self.bans.write().await;
                let before = bans.len();
                bans.retain(|b| b.address != address);
                bans.len() != before
            }
            AccessKind::Approval => {
                let mut approvals = self.approvals.write().await;
                let before = approvals.len();
                approvals.retain(|a| a.address != address);
                approvals.len() != before
            }
        };
        Ok(removed)
    }
}
