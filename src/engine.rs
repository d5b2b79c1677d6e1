//! Chain synchronizer driving the index forward one step at a time:
//! 1) load the durable progress marker,
//! 2) at the tip: verify recent history (rolling back forks), refresh the chain height,
//!    index newly seen mempool transactions,
//! 3) behind the tip: index the next block and advance progress by one.
use crate::{
    config::Pacing, fork, ingest, mempool::MempoolTracker, source::ChainSource,
    store::IndexStore, window::BlockWindow,
};
use anyhow::Context;
use std::time::Duration;
use tokio::{sync::watch, time::sleep};

/// Where the synchronizer currently is in its cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    /// Progress marker not read yet.
    LoadingProgress,
    /// Height checked is below the cached chain height.
    CatchingUp,
    /// Caught up; refreshing chain height and polling the mempool.
    AtTip,
    /// Fetching and indexing one block.
    IngestingBlock,
    /// Fork resolution in progress.
    RollingBack,
}

/// Snapshot published to subscribers whenever the engine's position changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncStatus {
    /// Current state.
    pub state: SyncState,
    /// Last fully indexed height, `None` until loaded.
    pub height_checked: Option<u32>,
    /// Last chain height reported by the node.
    pub chain_height: u32,
}

/// Core engine. `S` = index store, `R` = chain data source.
pub struct Indexer<S, R> {
    store: S,
    source: R,
    pacing: Pacing,
    state: SyncState,
    height_checked: Option<u32>,
    chain_height: u32,
    window: BlockWindow,
    mempool: MempoolTracker,
    rollbacks: u64,
    status: watch::Sender<SyncStatus>,
}

impl<S, R> Indexer<S, R>
where
    S: IndexStore,
    R: ChainSource,
{
    /// Create an engine over a store and a chain source, with default pacing.
    pub fn new(store: S, source: R) -> Self {
        let (status, _) = watch::channel(SyncStatus {
            state: SyncState::LoadingProgress,
            height_checked: None,
            chain_height: 0,
        });
        Self {
            store,
            source,
            pacing: Pacing::default(),
            state: SyncState::LoadingProgress,
            height_checked: None,
            chain_height: 0,
            window: BlockWindow::default(),
            mempool: MempoolTracker::default(),
            rollbacks: 0,
            status,
        }
    }

    /// Override the pauses between steps.
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Watch progress from another task.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Current state.
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Last fully indexed height, once loaded.
    pub fn height_checked(&self) -> Option<u32> {
        self.height_checked
    }

    /// Cached node chain height.
    pub fn chain_height(&self) -> u32 {
        self.chain_height
    }

    /// Recently indexed block hashes.
    pub fn window(&self) -> &BlockWindow {
        &self.window
    }

    /// Last mempool snapshot.
    pub fn mempool(&self) -> &MempoolTracker {
        &self.mempool
    }

    /// Total rollback steps taken since this engine was created.
    pub fn rollbacks(&self) -> u64 {
        self.rollbacks
    }

    /// The index store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The chain source.
    pub fn source(&self) -> &R {
        &self.source
    }

    /// Ensure the schema exists, then step forever.
    ///
    /// # Errors
    /// Only if the schema cannot be created; everything after that is retried internally.
    pub async fn run(mut self) -> anyhow::Result<()> {
        self.store
            .ensure_schema()
            .await
            .context("create index schema")?;
        loop {
            let pause = self.step().await;
            sleep(pause).await;
        }
    }

    /// Perform one cycle iteration and return how long to pause before the next one.
    pub async fn step(&mut self) -> Duration {
        match self.height_checked {
            None => self.load_progress().await,
            Some(height) if height >= self.chain_height => self.check_tip(height).await,
            Some(height) => self.ingest_next_block(height).await,
        }
    }

    async fn load_progress(&mut self) -> Duration {
        let height = match self.store.read_progress().await {
            Ok(Some(height)) => height,
            Ok(None) => match self.store.write_progress(0).await {
                Ok(()) => 0,
                Err(e) => {
                    log::error!("Database error: failed to initialize block_height_checked: {e:#}");
                    return self.pacing.retry;
                }
            },
            Err(e) => {
                log::error!("Database error: failed to read block_height_checked: {e:#}");
                return self.pacing.retry;
            }
        };
        log::info!("Resuming from block height {height}");
        self.height_checked = Some(height);
        self.settle(height);
        self.pacing.step
    }

    async fn check_tip(&mut self, mut height: u32) -> Duration {
        if fork::diverged(&self.source, &self.window, height, &self.pacing).await {
            self.set_state(SyncState::RollingBack);
            loop {
                fork::roll_back_one(&self.store, &mut self.window, &mut height).await;
                self.rollbacks += 1;
                self.height_checked = Some(height);
                self.set_state(SyncState::RollingBack);
                if !fork::diverged(&self.source, &self.window, height, &self.pacing).await {
                    break;
                }
            }
        }
        self.set_state(SyncState::AtTip);

        let count = match self.source.block_count().await {
            Ok(count) => count,
            Err(e) => {
                log::warn!("getblockcount failed: {e:#}");
                self.settle(height);
                return self.pacing.retry;
            }
        };

        if count == self.chain_height {
            self.poll_mempool().await;
            self.settle(height);
            return self.pacing.idle;
        }

        log::debug!("Chain height {} -> {count}", self.chain_height);
        self.chain_height = count;
        self.settle(height);
        self.pacing.tip_refresh
    }

    async fn ingest_next_block(&mut self, height: u32) -> Duration {
        self.set_state(SyncState::IngestingBlock);
        let next = height + 1;

        let hash = match self.source.block_hash(next).await {
            Ok(hash) => hash,
            Err(e) => {
                log::warn!("getblockhash {next} failed: {e:#}");
                self.settle(height);
                return self.pacing.retry;
            }
        };
        let block = match self.source.block(hash).await {
            Ok(block) => block,
            Err(e) => {
                log::warn!("getblock {hash} failed: {e:#}");
                self.settle(height);
                return self.pacing.retry;
            }
        };

        log::info!("Adding transactions from block height {next}");
        self.window.push(next, hash);
        let written =
            ingest::index_transactions(&self.source, &self.store, &block.txids, &self.pacing).await;
        log::debug!("Block {next} ({hash}): {} txs, {written} outputs", block.txids.len());

        // Progress moves on even if the write fails; the block may be indexed again later.
        self.height_checked = Some(next);
        if let Err(e) = self.store.write_progress(next).await {
            log::error!("Database error: failed to update block_height_checked: {e:#}");
        }
        self.settle(next);
        self.pacing.step
    }

    async fn poll_mempool(&mut self) {
        let snapshot = match self.source.mempool().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("getrawmempool failed: {e:#}");
                return;
            }
        };
        let fresh = self.mempool.observe(snapshot);
        if fresh.is_empty() {
            return;
        }
        log::info!("Adding {} unconfirmed transactions", fresh.len());
        sleep(self.pacing.mempool_gap).await;
        ingest::index_transactions(&self.source, &self.store, &fresh, &self.pacing).await;
    }

    fn settle(&mut self, height: u32) {
        let state = if height >= self.chain_height {
            SyncState::AtTip
        } else {
            SyncState::CatchingUp
        };
        self.set_state(state);
    }

    fn set_state(&mut self, state: SyncState) {
        self.state = state;
        self.status.send_replace(SyncStatus {
            state,
            height_checked: self.height_checked,
            chain_height: self.chain_height,
        });
    }
}
