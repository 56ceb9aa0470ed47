//! The reload pipeline: parse → index → stats → publish.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::dump::DumpParser;
use crate::error::DumpError;
use crate::index::IndexBuilder;
use crate::pool::DecodePool;
use crate::snapshot::{Snapshot, SnapshotStore};

/// Summary of a published snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub latest_height: u64,
    pub blocks: usize,
    pub transactions: usize,
    pub elapsed_ms: u64,
}

/// Runs the full pipeline for one dump file and publishes into a store.
#[derive(Clone)]
pub struct SnapshotLoader {
    dump_file: PathBuf,
    pool: Arc<DecodePool>,
    store: Arc<SnapshotStore>,
}

impl SnapshotLoader {
    pub fn new(dump_file: impl Into<PathBuf>, pool: Arc<DecodePool>, store: Arc<SnapshotStore>) -> Self {
        Self {
            dump_file: dump_file.into(),
            pool,
            store,
        }
    }

    pub fn dump_file(&self) -> &Path {
        &self.dump_file
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Parse and index the dump without publishing.
    pub async fn build(&self) -> Result<Snapshot, DumpError> {
        let parsed = DumpParser::new(Arc::clone(&self.pool))
            .parse(&self.dump_file)
            .await?;
        Ok(IndexBuilder::build(parsed))
    }

    /// Build a new snapshot and swap it in. On error the current snapshot
    /// stays in place.
    pub async fn reload(&self) -> Result<LoadSummary, DumpError> {
        let start = Instant::now();
        let snapshot = self.build().await?;
        let summary = LoadSummary {
            latest_height: snapshot.latest_height(),
            blocks: snapshot.blocks().len(),
            transactions: snapshot.transactions().len(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        self.store.publish(snapshot);
        tracing::info!(
            height = summary.latest_height,
            blocks = summary.blocks,
            txs = summary.transactions,
            elapsed_ms = summary.elapsed_ms,
            "Snapshot published"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dump::tests::{empty_block, render_dump};

    const GENESIS_BLOCK: &str = r#""height": 2,
"hash": "b2",
"txs": [{
"id": "g1",
"inputs": [],
"outputs": [{"address": "B1genesis", "bsqAmount": 1000, "txOutputType": "GENESIS_OUTPUT", "isVerified": true, "isUnspent": true, "opReturn": null}],
"txType": "GENESIS",
"burntFee": 0
}]"#;

    fn loader_for(contents: &str) -> (tempfile::TempDir, SnapshotLoader) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocks.json");
        std::fs::write(&path, contents).unwrap();
        let loader = SnapshotLoader::new(
            path,
            Arc::new(DecodePool::new(2).unwrap()),
            Arc::new(SnapshotStore::default()),
        );
        (dir, loader)
    }

    #[tokio::test]
    async fn chain_height_scenario() {
        let (_dir, loader) = loader_for(&render_dump(500, &[&empty_block(1, "b1"), GENESIS_BLOCK]));
        let summary = loader.reload().await.unwrap();
        assert_eq!(summary.blocks, 2);

        let snap = loader.store().current();
        assert_eq!(snap.latest_height(), 500);
        assert_eq!(snap.non_empty_blocks().len(), 1);
        let stats = snap.stats();
        assert_eq!(stats.minted, 10.0);
        assert_eq!(stats.burnt, 0.0);
        assert_eq!(stats.unspent_txos + stats.spent_txos, 1);
        assert_eq!(stats.unspent_txos, 1);
    }

    #[tokio::test]
    async fn failed_reload_keeps_current_snapshot() {
        let (dir, loader) = loader_for(&render_dump(500, &[GENESIS_BLOCK]));
        loader.reload().await.unwrap();

        std::fs::write(dir.path().join("blocks.json"), render_dump(501, &["\"hash\": ]"])).unwrap();
        assert!(loader.reload().await.is_err());
        assert_eq!(loader.store().current().latest_height(), 500);
    }

    #[tokio::test]
    async fn reload_is_idempotent() {
        let (_dir, loader) = loader_for(&render_dump(500, &[&empty_block(1, "b1"), GENESIS_BLOCK]));
        loader.reload().await.unwrap();
        let first = loader.store().current();
        loader.reload().await.unwrap();
        let second = loader.store().current();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.stats(), second.stats());
        assert_eq!(first.blocks(), second.blocks());
        assert_eq!(first.transactions(), second.transactions());
        assert_eq!(first.address_count(), second.address_count());
    }
}
