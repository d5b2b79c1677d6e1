//! Abstraction over the node that provides canonical chain data (blocks, transactions, mempool).
use async_trait::async_trait;
use bitcoin::{BlockHash, ScriptBuf, Txid};

/// The parts of a block the indexer needs: its hash and its ordered txids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockSummary {
    /// Hash the block was requested by.
    pub hash: BlockHash,
    /// Transaction ids in block order.
    pub txids: Vec<Txid>,
}

/// A transaction reduced to its id and the locking script of each output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxSummary {
    /// Transaction id.
    pub txid: Txid,
    /// `scriptPubKey` of every output, in `vout` order.
    pub outputs: Vec<ScriptBuf>,
}

/// Canonical chain data provider (normally a bitcoind-compatible JSON-RPC endpoint).
///
/// Every error is treated as transient by the engine and retried after a pause.
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Height of the node's best block (`getblockcount`).
    async fn block_count(&self) -> anyhow::Result<u32>;

    /// Hash of the best-chain block at `height` (`getblockhash`).
    async fn block_hash(&self, height: u32) -> anyhow::Result<BlockHash>;

    /// Block by hash with its txids (`getblock`).
    async fn block(&self, hash: BlockHash) -> anyhow::Result<BlockSummary>;

    /// Decoded transaction (`getrawtransaction <txid> true`).
    async fn transaction(&self, txid: Txid) -> anyhow::Result<TxSummary>;

    /// Current mempool txids (`getrawmempool`).
    async fn mempool(&self) -> anyhow::Result<Vec<Txid>>;
}
