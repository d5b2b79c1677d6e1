//! Persistence interfaces and implementations used by the engine
//! (the height-checked progress marker and the output-key index).
use async_trait::async_trait;
use bitcoin::{Script, Txid};

use crate::key::OutputKey;

/// Durable index: `OutputKey -> txid` pairs plus a single progress counter.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Create tables/indexes if they do not exist yet. Safe to call repeatedly.
    async fn ensure_schema(&self) -> anyhow::Result<()>;

    /// Height of the last fully indexed block, or `None` before first startup.
    async fn read_progress(&self) -> anyhow::Result<Option<u32>>;

    /// Overwrite the progress marker.
    async fn write_progress(&self, height: u32) -> anyhow::Result<()>;

    /// Record that `txid` has an output locked by the script behind `key`.
    /// Inserting a pair that already exists is a no-op.
    async fn insert_entry(&self, key: OutputKey, txid: Txid) -> anyhow::Result<()>;

    /// All txids recorded under `key`.
    async fn lookup(&self, key: OutputKey) -> anyhow::Result<Vec<Txid>>;

    /// Lookup by `scriptPubKey`.
    async fn lookup_script(&self, script: &Script) -> anyhow::Result<Vec<Txid>> {
        self.lookup(OutputKey::from_script(script)).await
    }
}

#[cfg(feature = "store-sqlite")]
pub mod sqlite_store;
#[cfg(feature = "store-sqlite")]
pub use sqlite_store::SqliteStore;
