//! Scripted in-memory chain used by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bitcoin::hashes::{sha256d, Hash};
use bitcoin::{BlockHash, ScriptBuf, Txid};
use spkindex::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct ChainState {
    /// Best chain, index = height, [0] = genesis.
    hashes: Vec<BlockHash>,
    blocks: HashMap<BlockHash, Vec<Txid>>,
    txs: HashMap<Txid, Vec<ScriptBuf>>,
    mempool: Vec<Txid>,
    /// op name -> number of upcoming calls that fail
    failures: HashMap<&'static str, u32>,
    calls: HashMap<&'static str, u32>,
    salt: u32,
}

/// Chain source whose best chain, mempool and failures are driven by the test.
#[derive(Clone)]
pub struct MockChain(Arc<Mutex<ChainState>>);

impl MockChain {
    /// Chain holding only a genesis block (height 0).
    pub fn new() -> Self {
        let chain = Self(Arc::new(Mutex::new(ChainState::default())));
        chain.mine(vec![]);
        chain
    }

    /// Append a block with the given transactions; returns its hash.
    pub fn mine(&self, txs: Vec<(Txid, Vec<ScriptBuf>)>) -> BlockHash {
        let mut s = self.0.lock().unwrap();
        s.salt += 1;
        let height = s.hashes.len() as u32;
        let hash = block_hash(height, s.salt);
        let mut ids = Vec::with_capacity(txs.len());
        for (txid, outputs) in txs {
            s.txs.insert(txid, outputs);
            ids.push(txid);
        }
        s.blocks.insert(hash, ids);
        s.hashes.push(hash);
        hash
    }

    /// Append `n` blocks with one single-output transaction each (txids/scripts derived from height).
    pub fn mine_simple(&self, n: u32) {
        for _ in 0..n {
            let h = self.tip_height() + 1;
            self.mine(vec![(txid(h), vec![script(h)])]);
        }
    }

    /// Drop every block above `height`.
    pub fn truncate(&self, height: u32) {
        self.0.lock().unwrap().hashes.truncate(height as usize + 1);
    }

    /// Replace the top `depth` blocks with empty blocks under new hashes.
    pub fn reorg(&self, depth: u32) {
        let tip = self.tip_height();
        self.truncate(tip - depth);
        for _ in 0..depth {
            self.mine(vec![]);
        }
    }

    /// Current best height.
    pub fn tip_height(&self) -> u32 {
        self.0.lock().unwrap().hashes.len() as u32 - 1
    }

    /// Best-chain hash at `height`.
    pub fn hash_at(&self, height: u32) -> BlockHash {
        self.0.lock().unwrap().hashes[height as usize]
    }

    /// Replace the mempool, registering the transactions.
    pub fn set_mempool(&self, txs: Vec<(Txid, Vec<ScriptBuf>)>) {
        let mut s = self.0.lock().unwrap();
        s.mempool.clear();
        for (txid, outputs) in txs {
            s.txs.insert(txid, outputs);
            s.mempool.push(txid);
        }
    }

    /// Make the next `n` calls of `op` fail.
    pub fn fail_next(&self, op: &'static str, n: u32) {
        self.0.lock().unwrap().failures.insert(op, n);
    }

    /// How many times `op` has been called.
    pub fn calls(&self, op: &'static str) -> u32 {
        self.0.lock().unwrap().calls.get(op).copied().unwrap_or(0)
    }

    fn enter(&self, op: &'static str) -> anyhow::Result<std::sync::MutexGuard<'_, ChainState>> {
        let mut s = self.0.lock().unwrap();
        *s.calls.entry(op).or_default() += 1;
        if let Some(left) = s.failures.get_mut(op) {
            if *left > 0 {
                *left -= 1;
                anyhow::bail!("injected {op} failure");
            }
        }
        Ok(s)
    }
}

#[async_trait]
impl ChainSource for MockChain {
    async fn block_count(&self) -> anyhow::Result<u32> {
        let s = self.enter("block_count")?;
        Ok(s.hashes.len() as u32 - 1)
    }

    async fn block_hash(&self, height: u32) -> anyhow::Result<BlockHash> {
        let s = self.enter("block_hash")?;
        match s.hashes.get(height as usize) {
            Some(hash) => Ok(*hash),
            None => anyhow::bail!("Block height out of range"),
        }
    }

    async fn block(&self, hash: BlockHash) -> anyhow::Result<BlockSummary> {
        let s = self.enter("block")?;
        match s.blocks.get(&hash) {
            Some(txids) => Ok(BlockSummary {
                hash,
                txids: txids.clone(),
            }),
            None => anyhow::bail!("Block not found"),
        }
    }

    async fn transaction(&self, txid: Txid) -> anyhow::Result<TxSummary> {
        let s = self.enter("transaction")?;
        match s.txs.get(&txid) {
            Some(outputs) => Ok(TxSummary {
                txid,
                outputs: outputs.clone(),
            }),
            None => anyhow::bail!("No such mempool or blockchain transaction"),
        }
    }

    async fn mempool(&self) -> anyhow::Result<Vec<Txid>> {
        let s = self.enter("mempool")?;
        Ok(s.mempool.clone())
    }
}

fn block_hash(height: u32, salt: u32) -> BlockHash {
    let mut data = height.to_le_bytes().to_vec();
    data.extend_from_slice(&salt.to_le_bytes());
    BlockHash::from_raw_hash(sha256d::Hash::hash(&data))
}

/// Deterministic txid.
pub fn txid(n: u32) -> Txid {
    Txid::from_raw_hash(sha256d::Hash::hash(&n.to_be_bytes()))
}

/// Deterministic, distinct locking script (OP_RETURN <n>).
pub fn script(n: u32) -> ScriptBuf {
    let mut bytes = vec![0x6a, 0x04];
    bytes.extend_from_slice(&n.to_be_bytes());
    ScriptBuf::from_bytes(bytes)
}

/// Engine over an in-memory SQLite store with no pacing.
pub fn engine(chain: &MockChain) -> Indexer<SqliteStore, MockChain> {
    let store = SqliteStore::new_in_memory().unwrap();
    Indexer::new(store, chain.clone()).with_pacing(Pacing::none())
}

/// Step until the engine has indexed the mock chain's current tip.
pub async fn sync_to_tip<S: IndexStore>(engine: &mut Indexer<S, MockChain>) {
    let target = engine.source().tip_height();
    for _ in 0..100_000 {
        if engine.height_checked() == Some(target) && engine.chain_height() == target {
            return;
        }
        engine.step().await;
    }
    panic!("engine did not reach tip {target}");
}
