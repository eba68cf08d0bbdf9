//! Persisted ban/approval store
//!
//! One store abstraction with two record kinds ([`BanRecord`] and
//! [`ApprovalRecord`]) keyed uniformly by client address. At most one record
//! of each kind exists per address; inserting a duplicate is a no-op.
//!
//! # Backends
//!
//! - [`FileAccessStore`]: two JSON array documents on disk with a
//!   write-through in-memory cache. Survives restarts.
//! - [`MemoryAccessStore`]: process-lifetime only, for tests and throwaway runs.
//!
//! # Unreadable documents
//!
//! [`StoreConfig::fail_open`](crate::config::StoreConfig) decides what happens
//! when a document exists but cannot be parsed: fail-open loads it as empty
//! (nothing banned, nothing approved) and logs a warning, fail-closed refuses
//! to open the store.

use async_trait::async_trait;

use crate::error::Result;

mod file;
mod memory;
mod record;

pub use file::FileAccessStore;
pub(crate) use file::write_document;
pub use memory::MemoryAccessStore;
pub use record::{AccessKind, AccessRecord, ApprovalRecord, BanRecord};

/// Durable mapping of client address to ban or approval record
///
/// Implementations must serialize their read-modify-write cycles so that
/// concurrent writers never lose each other's records.
#[async_trait]
pub trait AccessStore: Send + Sync + 'static {
    /// Whether a ban record exists for the address
    async fn is_banned(&self, address: &str) -> Result<bool>;

    /// Whether an approval record exists for the address
    async fn is_approved(&self, address: &str) -> Result<bool>;

    /// Persist a ban record
    ///
    /// Returns `false` without writing when the address is already banned.
    async fn record_ban(&self, record: BanRecord) -> Result<bool>;

    /// Persist an approval record
    ///
    /// Returns `false` without writing when the address is already approved.
    async fn record_approval(&self, record: ApprovalRecord) -> Result<bool>;

    /// All records of one kind, in insertion order
    async fn list(&self, kind: AccessKind) -> Result<Vec<AccessRecord>>;

    /// Remove the record of the given kind for an address (administrative action)
    ///
    /// Returns `false` when no such record existed.
    async fn remove(&self, kind: AccessKind, address: &str) -> Result<bool>;

    /// Addresses currently banned
    async fn banned_addresses(&self) -> Result<Vec<String>> {
        Ok(self
            .list(AccessKind::Ban)
            .await?
            .into_iter()
            .map(|record| record.address().to_string())
            .collect())
    }

    /// Flush pending state before shutdown
    ///
    /// Both bundled backends write through, so the default does nothing.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
