//! Fetch transactions one at a time and index every output under its [`OutputKey`].
use crate::{config::Pacing, key::OutputKey, source::ChainSource, store::IndexStore};
use bitcoin::Txid;
use tokio::time::sleep;

/// Index `txids` in order. A failed fetch or insert is retried after `pacing.retry`
/// until it succeeds; neither a transaction nor an output is ever skipped. Returns the
/// number of outputs written.
pub(crate) async fn index_transactions<R, S>(
    source: &R,
    store: &S,
    txids: &[Txid],
    pacing: &Pacing,
) -> usize
where
    R: ChainSource,
    S: IndexStore,
{
    let mut written = 0;
    for txid in txids {
        let tx = loop {
            match source.transaction(*txid).await {
                Ok(tx) => break tx,
                Err(e) => {
                    log::warn!("getrawtransaction {txid} failed, retrying: {e:#}");
                    sleep(pacing.retry).await;
                }
            }
        };

        for script in &tx.outputs {
            let key = OutputKey::from_script(script);
            while let Err(e) = store.insert_entry(key, tx.txid).await {
                log::error!("Database error: failed to index {key} -> {}, retrying: {e:#}", tx.txid);
                sleep(pacing.retry).await;
            }
            written += 1;
        }

        sleep(pacing.tx_gap).await;
    }
    written
}
