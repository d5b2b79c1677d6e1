#![forbid(unsafe_code)]
#![deny(missing_docs)]
//! spkindex: a polling `scriptPubKey -> txid` indexer for Bitcoin Core style nodes.
//!
//! ## What you implement (or take from this crate)
//! - [`ChainSource`]: block count, block hash by height, blocks, transactions, mempool.
//!   [`BitcoindRpc`] talks to a real node.
//! - [`IndexStore`]: a progress integer plus a unique `(output key, txid)` table.
//!   [`SqliteStore`] keeps both in one SQLite file.
//!
//! ## What the engine does
//! - Resumes from the durable **height checked** marker.
//! - Indexes one block at a time, strictly in height order, keying every output by
//!   the SHA-256 of its locking script.
//! - At the tip, compares the last 120 indexed block hashes with the node and **rolls
//!   back one block per mismatch** until they agree.
//! - While idle at the tip, indexes transactions newly seen in the **mempool**.
//! - Retries every transient RPC error forever after a fixed pause.
//!
//! Rollback does not delete entries written for abandoned blocks, so a lookup can
//! return txids that were reorganized out of the chain.
//!
//! ## Minimal usage
//! ```rust,ignore
//! use spkindex::prelude::*;
//! use bitcoincore_rpc::Auth;
//!
//! async fn run() -> anyhow::Result<()> {
//!     let store = SqliteStore::new("index.sqlite3")?;
//!     let source = BitcoindRpc::new("http://127.0.0.1:8332", Auth::None)?;
//!     let engine = Indexer::new(store, source);
//!     let mut status = engine.subscribe();
//!     tokio::spawn(async move {
//!         while status.changed().await.is_ok() {
//!             println!("{:?}", *status.borrow());
//!         }
//!     });
//!     engine.run().await
//! }
//! ```
/// Chain synchronizer: the state machine that drives indexing.
pub mod engine;

/// Chain data provider abstraction.
pub mod source;

/// Output key derivation (`scriptPubKey` -> SHA-256).
pub mod key;

/// Persistence layer (traits and SQLite implementation).
pub mod store;

/// Pacing and command-line options.
pub mod config;

/// Bounded history of recently indexed block hashes.
pub mod window;

/// Mempool snapshot diffing.
pub mod mempool;

/// JSON-RPC chain source.
#[cfg(feature = "rpc")]
pub mod rpc;

// Internal helpers:
mod fork;
mod ingest;

// Public re-exports
pub use config::Pacing;
pub use engine::{Indexer, SyncState, SyncStatus};
pub use key::OutputKey;
#[cfg(feature = "rpc")]
pub use rpc::BitcoindRpc;
pub use source::{BlockSummary, ChainSource, TxSummary};
#[cfg(feature = "store-sqlite")]
pub use store::SqliteStore;
pub use store::IndexStore;

/// Convenience prelude for end users.
pub mod prelude {
    #[cfg(feature = "rpc")]
    pub use crate::BitcoindRpc;
    #[cfg(feature = "store-sqlite")]
    pub use crate::SqliteStore;
    pub use crate::{
        BlockSummary, ChainSource, IndexStore, Indexer, OutputKey, Pacing, SyncState,
        SyncStatus, TxSummary,
    };
}
