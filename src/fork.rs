//! Fork detection against the recent-block window, rolled back one block per mismatch.
use crate::{config::Pacing, source::ChainSource, store::IndexStore, window::BlockWindow};
use bitcoin::BlockHash;
use tokio::time::sleep;

/// Whether the node's block at `height_checked` differs from the window tip.
///
/// An empty window is trusted as-is. Transient RPC errors are retried after
/// `pacing.retry` until the comparison can be made.
pub(crate) async fn diverged<R: ChainSource>(
    source: &R,
    window: &BlockWindow,
    height_checked: u32,
    pacing: &Pacing,
) -> bool {
    let Some((tip_height, expected)) = window.tip() else {
        return false;
    };
    debug_assert_eq!(tip_height, height_checked);

    let found = loop {
        match canonical_hash(source, height_checked).await {
            Ok(found) => break found,
            Err(e) => {
                log::warn!("getblockhash {height_checked} failed during fork check: {e:#}");
                sleep(pacing.retry).await;
            }
        }
    };
    if found == Some(expected) {
        return false;
    }

    log::warn!("Fork detected while checking block height {}", height_checked + 1);
    log::warn!("Expected hash: {expected}");
    match found {
        Some(found) => log::warn!("Found block hash: {found}"),
        None => log::warn!("Found block hash: none (chain is shorter)"),
    }
    true
}

/// One rollback step: drop the window tip, step `*height_checked` back by one and persist
/// it. A failed write is logged; the in-memory rollback stands regardless.
pub(crate) async fn roll_back_one<S: IndexStore>(
    store: &S,
    window: &mut BlockWindow,
    height_checked: &mut u32,
) {
    log::warn!("Rolling back progress by one block.");
    window.pop();
    *height_checked = height_checked.saturating_sub(1);
    if let Err(e) = store.write_progress(*height_checked).await {
        log::error!("Database error: failed to update block_height_checked: {e:#}");
    }
}

/// Best-chain hash at `height`, or `None` when the node's chain no longer reaches it.
async fn canonical_hash<R: ChainSource>(source: &R, height: u32) -> anyhow::Result<Option<BlockHash>> {
    match source.block_hash(height).await {
        Ok(hash) => Ok(Some(hash)),
        Err(e) => {
            if source.block_count().await? < height {
                Ok(None)
            } else {
                Err(e)
            }
        }
    }
}
