//! Read-only query surface handed to HTTP/websocket collaborators.
//!
//! Every call loads the current snapshot once and answers from it, so a
//! single call never mixes two snapshots. Callers that need several
//! consistent reads should hold on to [`QuerySurface::snapshot`].

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::price::{PriceFeed, PriceListener};
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::stats::Stats;
use crate::types::{BlockRecord, TransactionRecord, TxType};

/// Cheap, cloneable handle onto the current snapshot and price.
#[derive(Clone, Debug)]
pub struct QuerySurface {
    store: Arc<SnapshotStore>,
    price: Arc<PriceFeed>,
}

impl QuerySurface {
    pub fn new(store: Arc<SnapshotStore>, price: Arc<PriceFeed>) -> Self {
        Self { store, price }
    }

    /// The whole current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.store.current()
    }

    pub fn transaction(&self, id: &str) -> Option<Arc<TransactionRecord>> {
        self.store.current().transaction(id).cloned()
    }

    /// A page of transactions, optionally restricted to `types`, plus the
    /// total number of matches.
    pub fn transactions(
        &self,
        start: usize,
        length: usize,
        types: &[TxType],
    ) -> (Vec<Arc<TransactionRecord>>, usize) {
        let snap = self.store.current();
        let all = snap.transactions();
        if types.is_empty() {
            return (page(all, start, length), all.len());
        }

        let mut total = 0usize;
        let mut out = Vec::new();
        for tx in all.iter().filter(|tx| types.contains(&tx.tx_type)) {
            if total >= start && out.len() < length {
                out.push(Arc::clone(tx));
            }
            total += 1;
        }
        (out, total)
    }

    pub fn block(&self, hash: &str) -> Option<Arc<BlockRecord>> {
        self.store.current().block(hash).cloned()
    }

    /// Transactions referencing `address`; `None` if it never appears.
    pub fn address(&self, address: &str) -> Option<Vec<Arc<TransactionRecord>>> {
        self.store.current().address(address).map(<[_]>::to_vec)
    }

    /// A page of non-empty blocks, newest first, plus their total count.
    pub fn blocks(&self, start: usize, length: usize) -> (Vec<Arc<BlockRecord>>, usize) {
        let snap = self.store.current();
        let blocks = snap.non_empty_blocks();
        (page(blocks, start, length), blocks.len())
    }

    pub fn stats(&self) -> Stats {
        self.store.current().stats()
    }

    pub fn latest_height(&self) -> u64 {
        self.store.current().latest_height()
    }

    /// Latest smoothed price, if a poll has succeeded.
    pub fn price(&self) -> Option<f64> {
        self.price.current()
    }

    /// Channel receiving every new price.
    pub fn subscribe_price(&self) -> broadcast::Receiver<f64> {
        self.price.subscribe()
    }

    /// Call `listener` with every new price.
    pub fn on_price(&self, listener: Arc<dyn PriceListener>) {
        self.price.register(listener);
    }
}

fn page<T: Clone>(items: &[T], start: usize, length: usize) -> Vec<T> {
    let start = start.min(items.len());
    let end = start.saturating_add(length).min(items.len());
    items[start..end].to_vec()
}
