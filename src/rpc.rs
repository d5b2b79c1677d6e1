//! [`ChainSource`] backed by a Bitcoin Core compatible JSON-RPC endpoint.
use crate::source::{BlockSummary, ChainSource, TxSummary};
use anyhow::Context;
use async_trait::async_trait;
use bitcoin::{BlockHash, ScriptBuf, Txid};
use bitcoincore_rpc::{Auth, Client, RpcApi};
use std::sync::Arc;
use tokio::task;

/// Blocking `bitcoincore_rpc` client moved onto the blocking pool for every call.
#[derive(Clone)]
pub struct BitcoindRpc {
    client: Arc<Client>,
}

impl BitcoindRpc {
    /// Connect to `url` with `auth`. No request is made until the first call.
    pub fn new(url: &str, auth: Auth) -> anyhow::Result<Self> {
        let client = Client::new(url, auth).with_context(|| format!("rpc client for {url}"))?;
        Ok(Self {
            client: Arc::new(client),
        })
    }

    async fn call<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Client) -> bitcoincore_rpc::Result<T> + Send + 'static,
    {
        let client = Arc::clone(&self.client);
        Ok(task::spawn_blocking(move || f(&client)).await??)
    }
}

#[async_trait]
impl ChainSource for BitcoindRpc {
    async fn block_count(&self) -> anyhow::Result<u32> {
        let count = self.call(|c| c.get_block_count()).await?;
        Ok(u32::try_from(count).context("block count out of range")?)
    }

    async fn block_hash(&self, height: u32) -> anyhow::Result<BlockHash> {
        self.call(move |c| c.get_block_hash(u64::from(height)))
            .await
            .with_context(|| format!("getblockhash {height}"))
    }

    async fn block(&self, hash: BlockHash) -> anyhow::Result<BlockSummary> {
        let info = self
            .call(move |c| c.get_block_info(&hash))
            .await
            .with_context(|| format!("getblock {hash}"))?;
        Ok(BlockSummary {
            hash: info.hash,
            txids: info.tx,
        })
    }

    async fn transaction(&self, txid: Txid) -> anyhow::Result<TxSummary> {
        let info = self
            .call(move |c| c.get_raw_transaction_info(&txid, None))
            .await
            .with_context(|| format!("getrawtransaction {txid}"))?;
        Ok(TxSummary {
            txid: info.txid,
            outputs: info
                .vout
                .into_iter()
                .map(|out| ScriptBuf::from_bytes(out.script_pub_key.hex))
                .collect(),
        })
    }

    async fn mempool(&self) -> anyhow::Result<Vec<Txid>> {
        self.call(|c| c.get_raw_mempool())
            .await
            .context("getrawmempool")
    }
}
