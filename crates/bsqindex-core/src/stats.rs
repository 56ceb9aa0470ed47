//! Ledger-wide aggregate statistics.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{TransactionRecord, TxOutputType};

/// Divisor from the dump's smallest unit to displayed BSQ.
pub const BSQ_DISPLAY_DIVISOR: f64 = 100.0;

/// Aggregate counters for one snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    /// Total issued BSQ (display denomination).
    pub minted: f64,
    /// Total burnt fees (display denomination).
    pub burnt: f64,
    /// Number of distinct addresses in the address index.
    pub addresses: usize,
    pub unspent_txos: usize,
    pub spent_txos: usize,
}

/// Computes [`Stats`] from a flattened transaction list.
pub struct StatsAggregator;

impl StatsAggregator {
    /// Single pass over `transactions`.
    ///
    /// Genesis outputs count as minted regardless of verification, issuance
    /// candidates only once verified. Every non-OP_RETURN output is also
    /// counted as spent or unspent.
    pub fn compute(transactions: &[Arc<TransactionRecord>], address_count: usize) -> Stats {
        let mut minted: u64 = 0;
        let mut burnt: u64 = 0;
        let mut unspent = 0usize;
        let mut spent = 0usize;

        for tx in transactions {
            for output in &tx.outputs {
                if output.is_op_return() {
                    continue;
                }
                let mints = match output.tx_output_type {
                    TxOutputType::Genesis => true,
                    TxOutputType::IssuanceCandidate => output.is_verified,
                    _ => false,
                };
                if mints {
                    minted += output.bsq_amount;
                }
                if output.is_unspent {
                    unspent += 1;
                } else {
                    spent += 1;
                }
            }
            burnt += tx.burnt_fee;
        }

        Stats {
            minted: minted as f64 / BSQ_DISPLAY_DIVISOR,
            burnt: burnt as f64 / BSQ_DISPLAY_DIVISOR,
            addresses: address_count,
            unspent_txos: unspent,
            spent_txos: spent,
        }
    }
}
