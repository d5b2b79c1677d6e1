use bitcoin::Txid;
use std::collections::HashSet;

/// Last observed mempool snapshot, used only to find txids that appeared since the previous poll.
#[derive(Clone, Debug, Default)]
pub struct MempoolTracker {
    known: HashSet<Txid>,
}

impl MempoolTracker {
    /// Replace the stored snapshot with `snapshot` and return the ids it adds
    /// over the previous one, in snapshot order.
    pub fn observe(&mut self, snapshot: Vec<Txid>) -> Vec<Txid> {
        let mut next = HashSet::with_capacity(snapshot.len());
        let mut fresh = Vec::new();
        for txid in snapshot {
            if next.insert(txid) && !self.known.contains(&txid) {
                fresh.push(txid);
            }
        }
        self.known = next;
        fresh
    }

    /// Whether `txid` was in the last snapshot.
    pub fn contains(&self, txid: &Txid) -> bool {
        self.known.contains(txid)
    }

    /// Size of the last snapshot.
    pub fn len(&self) -> usize {
        self.known.len()
    }

    /// `true` before the first poll or after an empty snapshot.
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}
