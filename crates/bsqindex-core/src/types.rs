//! Ledger records as they appear in the `blocks.json` dump.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

// ─── BlockRecord ──────────────────────────────────────────────────────────────

/// One block of the DAO ledger dump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRecord {
    /// Block height. May repeat across reorgs; treated as opaque.
    pub height: u64,
    /// Unix time of the block (milliseconds).
    #[serde(default)]
    pub time: i64,
    /// Block hash.
    pub hash: String,
    /// Hash of the parent block.
    #[serde(default)]
    pub previous_block_hash: String,
    /// Transactions in block order.
    #[serde(default)]
    pub txs: Vec<Arc<TransactionRecord>>,
}

impl BlockRecord {
    /// Returns `true` if the block carries at least one transaction.
    pub fn has_transactions(&self) -> bool {
        !self.txs.is_empty()
    }
}

// ─── TransactionRecord ────────────────────────────────────────────────────────

/// A BSQ transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    /// Transaction id, unique across the dump.
    pub id: String,
    #[serde(default)]
    pub block_height: u64,
    #[serde(default)]
    pub block_hash: String,
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub inputs: Vec<InputRecord>,
    #[serde(default)]
    pub outputs: Vec<OutputRecord>,
    #[serde(default)]
    pub tx_type: TxType,
    #[serde(default)]
    pub tx_type_display_string: String,
    /// Fee burnt by this transaction, in the source denomination.
    #[serde(default)]
    pub burnt_fee: u64,
    #[serde(default)]
    pub invalidated_bsq: u64,
    #[serde(default)]
    pub unlock_block_height: u64,
}

impl TransactionRecord {
    /// Returns `true` if any input or output references `address`.
    pub fn references(&self, address: &str) -> bool {
        self.inputs.iter().any(|i| i.address == address)
            || self.outputs.iter().any(|o| o.address == address)
    }
}

/// A spent reference to a previous output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputRecord {
    #[serde(default)]
    pub spending_tx_output_index: u32,
    #[serde(default)]
    pub spending_tx_id: String,
    #[serde(default)]
    pub bsq_amount: u64,
    #[serde(default)]
    pub is_verified: bool,
    /// Address of the spent output; empty for non-standard scripts.
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub time: i64,
}

/// A transaction output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputRecord {
    #[serde(default)]
    pub tx_id: String,
    #[serde(default)]
    pub index: u32,
    /// Amount in the smallest BSQ unit.
    #[serde(default)]
    pub bsq_amount: u64,
    #[serde(default)]
    pub btc_amount: u64,
    #[serde(default)]
    pub height: u64,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub burnt_fee: u64,
    #[serde(default)]
    pub invalidated_bsq: u64,
    /// Address of the output; empty for OP_RETURN and other non-standard scripts.
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub tx_type: TxType,
    #[serde(default)]
    pub tx_output_type: TxOutputType,
    #[serde(default)]
    pub lock_time: u64,
    #[serde(default)]
    pub is_unspent: bool,
    #[serde(default)]
    pub op_return: Option<String>,
}

impl OutputRecord {
    /// Returns `true` for OP_RETURN outputs (carry data, not value).
    pub fn is_op_return(&self) -> bool {
        self.op_return.as_deref().is_some_and(|s| !s.is_empty())
    }
}

// ─── Tags ─────────────────────────────────────────────────────────────────────

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident => $wire:literal,)+ }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant,)+
            /// Any tag this build doesn't know about.
            #[default]
            #[serde(other)]
            Unknown,
        }

        impl $name {
            /// The tag as written in the dump.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                    Self::Unknown => "UNKNOWN",
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownTag;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(Self::$variant),)+
                    other => Err(UnknownTag(other.to_string())),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// A tag string that matches no known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tag: {0}")]
pub struct UnknownTag(pub String);

wire_enum! {
    /// Classification of a whole transaction.
    pub enum TxType {
        Undefined => "UNDEFINED_TX_TYPE",
        Unverified => "UNVERIFIED",
        Invalid => "INVALID",
        Genesis => "GENESIS",
        TransferBsq => "TRANSFER_BSQ",
        PayTradeFee => "PAY_TRADE_FEE",
        Proposal => "PROPOSAL",
        CompensationRequest => "COMPENSATION_REQUEST",
        ReimbursementRequest => "REIMBURSEMENT_REQUEST",
        BlindVote => "BLIND_VOTE",
        VoteReveal => "VOTE_REVEAL",
        Lockup => "LOCKUP",
        Unlock => "UNLOCK",
        AssetListingFee => "ASSET_LISTING_FEE",
        ProofOfBurn => "PROOF_OF_BURN",
        Irregular => "IRREGULAR",
    }
}

wire_enum! {
    /// Classification of a single output.
    pub enum TxOutputType {
        Undefined => "UNDEFINED_OUTPUT",
        Genesis => "GENESIS_OUTPUT",
        Bsq => "BSQ_OUTPUT",
        Btc => "BTC_OUTPUT",
        ProposalOpReturn => "PROPOSAL_OP_RETURN_OUTPUT",
        CompReqOpReturn => "COMP_REQ_OP_RETURN_OUTPUT",
        ReimbursementOpReturn => "REIMBURSEMENT_OP_RETURN_OUTPUT",
        ConfiscateBondOpReturn => "CONFISCATE_BOND_OP_RETURN_OUTPUT",
        IssuanceCandidate => "ISSUANCE_CANDIDATE_OUTPUT",
        BlindVoteLockStake => "BLIND_VOTE_LOCK_STAKE_OUTPUT",
        BlindVoteOpReturn => "BLIND_VOTE_OP_RETURN_OUTPUT",
        VoteRevealUnlockStake => "VOTE_REVEAL_UNLOCK_STAKE_OUTPUT",
        VoteRevealOpReturn => "VOTE_REVEAL_OP_RETURN_OUTPUT",
        AssetListingFeeOpReturn => "ASSET_LISTING_FEE_OP_RETURN_OUTPUT",
        ProofOfBurnOpReturn => "PROOF_OF_BURN_OP_RETURN_OUTPUT",
        Lockup => "LOCKUP_OUTPUT",
        LockupOpReturn => "LOCKUP_OP_RETURN_OUTPUT",
        Unlock => "UNLOCK_OUTPUT",
        Invalid => "INVALID_OUTPUT",
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: &str = r#"{
        "height": 571747,
        "time": 1554102000000,
        "hash": "0000000000000000001e5c3b",
        "previousBlockHash": "0000000000000000002a7f11",
        "txs": [{
            "txVersion": "1",
            "id": "4b5417ec5ab6112bedf539c3b4f5a806ed539542d8b717e1c4470aa3180edce5",
            "blockHeight": 571747,
            "blockHash": "0000000000000000001e5c3b",
            "time": 1554102000000,
            "inputs": [],
            "outputs": [{
                "txVersion": "1",
                "txId": "4b5417ec5ab6112bedf539c3b4f5a806ed539542d8b717e1c4470aa3180edce5",
                "index": 0,
                "bsqAmount": 250000000,
                "btcAmount": 0,
                "height": 571747,
                "isVerified": true,
                "burntFee": 0,
                "invalidatedBsq": 0,
                "address": "B1MTKSgjq3Xv1tx4jbZVJdWFXaGVABvqDQM",
                "scriptPubKey": {"addresses": [], "asm": "", "hex": "", "type": "PUB_KEY_HASH"},
                "spentInfo": null,
                "time": 1554102000000,
                "txType": "GENESIS",
                "txTypeDisplayString": "Genesis",
                "txOutputType": "GENESIS_OUTPUT",
                "txOutputTypeDisplayString": "Genesis",
                "lockTime": 0,
                "isUnspent": true,
                "opReturn": null
            }],
            "txType": "GENESIS",
            "txTypeDisplayString": "Genesis",
            "burntFee": 0,
            "invalidatedBsq": 0,
            "unlockBlockHeight": 0
        }]
    }"#;

    #[test]
    fn decode_block_with_genesis_tx() {
        let block: BlockRecord = serde_json::from_str(BLOCK).unwrap();
        assert_eq!(block.height, 571747);
        assert!(block.has_transactions());

        let tx = &block.txs[0];
        assert_eq!(tx.tx_type, TxType::Genesis);
        assert_eq!(tx.outputs[0].tx_output_type, TxOutputType::Genesis);
        assert_eq!(tx.outputs[0].bsq_amount, 250_000_000);
        assert!(!tx.outputs[0].is_op_return());
        assert!(tx.references("B1MTKSgjq3Xv1tx4jbZVJdWFXaGVABvqDQM"));
        assert!(!tx.references("B1other"));
    }

    #[test]
    fn unknown_tags_fall_back() {
        let out: OutputRecord =
            serde_json::from_str(r#"{"txOutputType": "SOMETHING_NEW", "opReturn": "1401"}"#).unwrap();
        assert_eq!(out.tx_output_type, TxOutputType::Unknown);
        assert!(out.is_op_return());
    }

    #[test]
    fn tx_type_from_wire_name() {
        assert_eq!("PROOF_OF_BURN".parse::<TxType>().unwrap(), TxType::ProofOfBurn);
        assert_eq!(TxType::PayTradeFee.to_string(), "PAY_TRADE_FEE");
        assert!("proof_of_burn".parse::<TxType>().is_err());
    }
}
