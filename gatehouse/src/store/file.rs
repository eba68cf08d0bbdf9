//! JSON-document backend for the access store

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{AccessKind, AccessRecord, AccessStore, ApprovalRecord, BanRecord};
use crate::config::StoreConfig;
use crate::error::{Error, Result};

/// Access store backed by two JSON array documents
///
/// Both documents are loaded once at [`open`](Self::open) into a cache guarded
/// by a `RwLock`; lookups answer from the cache. Every mutation takes the
/// write lock, re-reads the document from disk, rewrites the whole document
/// through a temp file plus rename, and only then updates the cache, so a
/// failed write leaves the cache matching what is on disk.
///
/// Because mutations start from the disk copy, an edit made by another
/// process (for example `gatehouse bans remove` while the server runs) is
/// never overwritten. Lookups see it once this store next writes that
/// document or is reopened.
pub struct FileAccessStore {
    bans_path: PathBuf,
    approvals_path: PathBuf,
    documents: RwLock<Documents>,
}

#[derive(Default)]
struct Documents {
    bans: Vec<BanRecord>,
    approvals: Vec<ApprovalRecord>,
}

impl FileAccessStore {
    /// Open the store described by the configuration
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        Self::open_paths(config.bans_path(), config.approvals_path(), config.fail_open).await
    }

    /// Open a store from explicit document paths
    pub async fn open_paths(
        bans_path: impl Into<PathBuf>,
        approvals_path: impl Into<PathBuf>,
        fail_open: bool,
    ) -> Result<Self> {
        let bans_path = bans_path.into();
        let approvals_path = approvals_path.into();

        let bans: Vec<BanRecord> = load_document(&bans_path, fail_open).await?;
        let approvals: Vec<ApprovalRecord> = load_document(&approvals_path, fail_open).await?;

        info!(
            bans = bans.len(),
            approvals = approvals.len(),
            bans_path = %bans_path.display(),
            approvals_path = %approvals_path.display(),
            "Access store opened"
        );

        Ok(Self {
            bans_path,
            approvals_path,
            documents: RwLock::new(Documents { bans, approvals }),
        })
    }

    /// Path of the ban document
    pub fn bans_path(&self) -> &Path {
        &self.bans_path
    }

    /// Path of the approval document
    pub fn approvals_path(&self) -> &Path {
        &self.approvals_path
    }
}

#[async_trait]
impl AccessStore for FileAccessStore {
    async fn is_banned(&self, address: &str) -> Result<bool> {
        let documents = self.documents.read().await;
        Ok(documents.bans.iter().any(|b| b.address == address))
    }

    async fn is_approved(&self, address: &str) -> Result<bool> {
        let documents = self.documents.read().await;
        Ok(documents.approvals.iter().any(|a| a.address == address))
    }

    async fn record_ban(&self, record: BanRecord) -> Result<bool> {
        let mut documents = self.documents.write().await;
        let mut next = refresh(&self.bans_path, &documents.bans).await;
        if next.iter().any(|b| b.address == record.address) {
            debug!(address = %record.address, "Ban already recorded");
            documents.bans = next;
            return Ok(false);
        }

        next.push(record);
        write_document(&self.bans_path, &next).await?;
        documents.bans = next;
        Ok(true)
    }

    async fn record_approval(&self, record: ApprovalRecord) -> Result<bool> {
        let mut documents = self.documents.write().await;
        let mut next = refresh(&self.approvals_path, &documents.approvals).await;
        if next.iter().any(|a| a.address == record.address) {
            documents.approvals = next;
            return Ok(false);
        }

        next.push(record);
        write_document(&self.approvals_path, &next).await?;
        documents.approvals = next;
        Ok(true)
    }

    async fn list(&self, kind: AccessKind) -> Result<Vec<AccessRecord>> {
        let documents = self.documents.read().await;
        Ok(match kind {
            AccessKind::Ban => documents.bans.iter().cloned().map(AccessRecord::Ban).collect(),
            AccessKind::Approval => documents
                .approvals
                .iter()
                .cloned()
                .map(AccessRecord::Approval)
                .collect(),
        })
    }

    async fn remove(&self, kind: AccessKind, address: &str) -> Result<bool> {
        let mut documents = self.documents.write().await;
        match kind {
            AccessKind::Ban => {
                let current = refresh(&self.bans_path, &documents.bans).await;
                let next: Vec<BanRecord> = current
                    .iter()
                    .filter(|b| b.address != address)
                    .cloned()
                    .collect();
                if next.len() == current.len() {
                    documents.bans = current;
                    return Ok(false);
                }
                write_document(&self.bans_path, &next).await?;
                documents.bans = next;
            }
            AccessKind::Approval => {
                let current = refresh(&self.approvals_path, &documents.approvals).await;
                let next: Vec<ApprovalRecord> = current
                    .iter()
                    .filter(|a| a.address != address)
                    .cloned()
                    .collect();
                if next.len() == current.len() {
                    documents.approvals = current;
                    return Ok(false);
                }
                write_document(&self.approvals_path, &next).await?;
                documents.approvals = next;
            }
        }

        info!(address = address, kind = %kind, "Access record removed");
        Ok(true)
    }
}

/// Read a JSON array document
///
/// A missing file is an empty document. An unreadable or unparseable file is
/// empty under fail-open and an error under fail-closed.
async fn load_document<T: DeserializeOwned>(path: &Path, fail_open: bool) -> Result<Vec<T>> {
    let contents = match tokio::fs::read(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return unreadable(path, fail_open, e.to_string()),
    };

    if contents.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    match serde_json::from_slice(&contents) {
        Ok(records) => Ok(records),
        Err(e) => unreadable(path, fail_open, e.to_string()),
    }
}

/// Disk copy of a document as the base of a read-modify-write
///
/// An unreadable document falls back to the cached copy; a bad read must not
/// turn into a rewrite that erases every record.
async fn refresh<T: DeserializeOwned + Clone>(path: &Path, cached: &[T]) -> Vec<T> {
    match load_document(path, false).await {
        Ok(records) => records,
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Store document unreadable, writing from cache"
            );
            cached.to_vec()
        }
    }
}

fn unreadable<T>(path: &Path, fail_open: bool, reason: String) -> Result<Vec<T>> {
    if fail_open {
        warn!(
            path = %path.display(),
            error = %reason,
            "Store document unreadable, treating as empty"
        );
        Ok(Vec::new())
    } else {
        Err(Error::Store(format!(
            "Failed to read {}: {}",
            path.display(),
            reason
        )))
    }
}

/// Replace a JSON document atomically: write a sibling temp file, then rename over
pub(crate) async fn write_document<T>(path: &Path, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            Error::Store(format!(
                "Failed to create store directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    let json = serde_json::to_vec_pretty(value)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, &json)
        .await
        .map_err(|e| Error::Store(format!("Failed to write {}: {}", tmp.display(), e)))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| Error::Store(format!("Failed to replace {}: {}", path.display(), e)))?;

    debug!(path = %path.display(), "Store document written");
    Ok(())
}
