//! Immutable snapshot of the indexed dump, and the store that publishes it.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::stats::Stats;
use crate::types::{BlockRecord, TransactionRecord};

/// One complete, self-consistent view of the dump.
///
/// Built once by [`crate::index::IndexBuilder`] and never mutated afterwards;
/// a reload produces a new `Snapshot` and swaps it in.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub(crate) latest_height: u64,
    /// All blocks, newest first.
    pub(crate) blocks: Vec<Arc<BlockRecord>>,
    /// Blocks with at least one transaction, newest first.
    pub(crate) non_empty_blocks: Vec<Arc<BlockRecord>>,
    /// Every transaction, in block order (newest block first).
    pub(crate) transactions: Vec<Arc<TransactionRecord>>,
    pub(crate) block_index: HashMap<String, Arc<BlockRecord>>,
    pub(crate) tx_index: HashMap<String, Arc<TransactionRecord>>,
    pub(crate) address_index: HashMap<String, Vec<Arc<TransactionRecord>>>,
    pub(crate) stats: Stats,
}

impl Snapshot {
    /// Snapshot served before the first successful load.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn latest_height(&self) -> u64 {
        self.latest_height
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn blocks(&self) -> &[Arc<BlockRecord>] {
        &self.blocks
    }

    pub fn non_empty_blocks(&self) -> &[Arc<BlockRecord>] {
        &self.non_empty_blocks
    }

    pub fn transactions(&self) -> &[Arc<TransactionRecord>] {
        &self.transactions
    }

    pub fn block(&self, hash: &str) -> Option<&Arc<BlockRecord>> {
        self.block_index.get(hash)
    }

    pub fn transaction(&self, id: &str) -> Option<&Arc<TransactionRecord>> {
        self.tx_index.get(id)
    }

    /// Transactions touching `address`, each at most once.
    pub fn address(&self, address: &str) -> Option<&[Arc<TransactionRecord>]> {
        self.address_index.get(address).map(Vec::as_slice)
    }

    /// Number of distinct addresses.
    pub fn address_count(&self) -> usize {
        self.address_index.len()
    }
}

/// Holder of the current snapshot.
///
/// Readers load the current `Arc<Snapshot>` wait-free; the writer replaces it
/// in one atomic store.
pub struct SnapshotStore {
    current: ArcSwap<Snapshot>,
}

impl SnapshotStore {
    pub fn new(initial: Snapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    /// The snapshot being served right now.
    pub fn current(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Replace the served snapshot.
    pub fn publish(&self, snapshot: Snapshot) {
        self.current.store(Arc::new(snapshot));
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(Snapshot::empty())
    }
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snap = self.current.load();
        f.debug_struct("SnapshotStore")
            .field("latest_height", &snap.latest_height)
            .field("blocks", &snap.blocks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_swaps_whole_snapshot() {
        let store = SnapshotStore::default();
        let before = store.current();
        assert_eq!(before.latest_height(), 0);

        store.publish(Snapshot {
            latest_height: 700_000,
            ..Snapshot::default()
        });

        // Old readers keep their view; new readers see the new one.
        assert_eq!(before.latest_height(), 0);
        assert_eq!(store.current().latest_height(), 700_000);
    }
}
