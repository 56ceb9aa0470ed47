//! Index builder: turns parsed blocks into a [`Snapshot`].
//!
//! Pass 1 walks the blocks: hash index, flattened transaction list, id index.
//! Pass 2 walks the transactions: address index, inputs before outputs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::dump::ParsedDump;
use crate::snapshot::Snapshot;
use crate::stats::StatsAggregator;
use crate::types::{BlockRecord, TransactionRecord};

pub struct IndexBuilder;

impl IndexBuilder {
    /// Build a snapshot from a dump scan (blocks in dump order, oldest first).
    pub fn build(parsed: ParsedDump) -> Snapshot {
        let start = Instant::now();

        let mut blocks: Vec<Arc<BlockRecord>> = parsed.blocks.into_iter().map(Arc::new).collect();
        blocks.reverse();

        let non_empty_blocks: Vec<_> = blocks
            .iter()
            .filter(|b| b.has_transactions())
            .cloned()
            .collect();

        let mut block_index = HashMap::with_capacity(blocks.len());
        let mut transactions = Vec::new();
        let mut tx_index = HashMap::new();

        for block in &blocks {
            block_index
                .entry(block.hash.clone())
                .or_insert_with(|| Arc::clone(block));
            for tx in &block.txs {
                transactions.push(Arc::clone(tx));
                tx_index.insert(tx.id.clone(), Arc::clone(tx));
            }
        }

        let mut address_index: HashMap<String, Vec<Arc<TransactionRecord>>> = HashMap::new();
        for tx in &transactions {
            let addresses = tx
                .inputs
                .iter()
                .map(|i| &i.address)
                .chain(tx.outputs.iter().map(|o| &o.address));
            for address in addresses {
                let list = address_index.entry(address.clone()).or_default();
                // All entries for `tx` are pushed while walking it, so a
                // repeat can only be the tail.
                if !list.last().is_some_and(|last| Arc::ptr_eq(last, tx)) {
                    list.push(Arc::clone(tx));
                }
            }
        }

        let stats = StatsAggregator::compute(&transactions, address_index.len());

        tracing::debug!(
            blocks = blocks.len(),
            txs = transactions.len(),
            addresses = address_index.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Index rebuilt"
        );

        Snapshot {
            latest_height: parsed.latest_height,
            blocks,
            non_empty_blocks,
            transactions,
            block_index,
            tx_index,
            address_index,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InputRecord, OutputRecord};

    fn input(address: &str) -> InputRecord {
        serde_json::from_value(serde_json::json!({ "address": address })).unwrap()
    }

    fn output(address: &str) -> OutputRecord {
        serde_json::from_value(serde_json::json!({ "address": address, "isUnspent": true })).unwrap()
    }

    fn tx(id: &str, inputs: &[&str], outputs: &[&str]) -> Arc<TransactionRecord> {
        let mut tx: TransactionRecord =
            serde_json::from_value(serde_json::json!({ "id": id })).unwrap();
        tx.inputs = inputs.iter().map(|a| input(a)).collect();
        tx.outputs = outputs.iter().map(|a| output(a)).collect();
        Arc::new(tx)
    }

    fn block(height: u64, hash: &str, txs: Vec<Arc<TransactionRecord>>) -> BlockRecord {
        BlockRecord {
            height,
            time: 0,
            hash: hash.into(),
            previous_block_hash: String::new(),
            txs,
        }
    }

    fn build(blocks: Vec<BlockRecord>) -> Snapshot {
        IndexBuilder::build(ParsedDump {
            latest_height: 10,
            blocks,
        })
    }

    #[test]
    fn blocks_are_newest_first_and_filtered() {
        let snap = build(vec![
            block(1, "a", vec![tx("t1", &[], &["B1"])]),
            block(2, "b", vec![]),
            block(3, "c", vec![tx("t3", &[], &["B2"])]),
        ]);
        let all: Vec<_> = snap.blocks().iter().map(|b| b.hash.as_str()).collect();
        assert_eq!(all, ["c", "b", "a"]);
        let non_empty: Vec<_> = snap.non_empty_blocks().iter().map(|b| b.hash.as_str()).collect();
        assert_eq!(non_empty, ["c", "a"]);
    }

    #[test]
    fn tx_lookup_returns_exact_id() {
        let snap = build(vec![block(1, "a", vec![tx("t1", &[], &["B1"]), tx("t2", &[], &["B1"])])]);
        assert_eq!(snap.transaction("t2").unwrap().id, "t2");
        assert!(snap.transaction("t3").is_none());
        assert_eq!(snap.block("a").unwrap().height, 1);
    }

    #[test]
    fn self_referencing_tx_listed_once() {
        let snap = build(vec![block(
            1,
            "a",
            vec![
                tx("t1", &["B1", "B1"], &["B1", "B2"]),
                tx("t2", &["B2"], &["B3"]),
            ],
        )]);

        let b1 = snap.address("B1").unwrap();
        assert_eq!(b1.len(), 1);
        assert_eq!(b1[0].id, "t1");

        let b2: Vec<_> = snap.address("B2").unwrap().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(b2, ["t1", "t2"]);

        for (addr, txs) in &snap.address_index {
            for t in txs {
                assert!(t.references(addr));
            }
        }
        assert_eq!(snap.address_count(), 3);
    }

    #[test]
    fn first_block_with_hash_wins() {
        let snap = build(vec![block(1, "dup", vec![]), block(2, "dup", vec![])]);
        // Newest first, so the later block in the dump is kept.
        assert_eq!(snap.block("dup").unwrap().height, 2);
    }
}
