//! Witness data types carried through a dispute.

use std::collections::HashMap;

use alloy::primitives::{Address, Bytes, B256, U256};
use proof_trie::Trie;
use serde::{Deserialize, Serialize};

use crate::contracts::{ChainBatchHeader, ChainInclusionProof, Transaction, TransactionChainElement};

/// Proof that a state root is a leaf of a batch committed on the settlement
/// chain.
#[derive(Debug)]
pub struct StateRootBatchProof {
    pub state_root: B256,
    pub header: ChainBatchHeader,
    pub proof: ChainInclusionProof,
}

/// Proof that a transaction (via its chain element) is a leaf of a committed
/// transaction batch.
#[derive(Debug)]
pub struct TransactionBatchProof {
    pub transaction: Transaction,
    pub element: TransactionChainElement,
    pub header: ChainBatchHeader,
    pub proof: ChainInclusionProof,
}

/// The pre-execution witness for one account touched by the disputed
/// transaction, as returned by the rollup node.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStateProof {
    pub address: Address,
    #[serde(with = "alloy::serde::quantity")]
    pub nonce: u64,
    pub balance: U256,
    pub code_hash: B256,
    pub storage_root: B256,
    pub account_proof: Vec<Bytes>,
    pub storage_proof: Vec<StorageStateProof>,
}

/// The pre-execution witness for one storage slot.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStateProof {
    pub key: B256,
    pub value: B256,
    pub proof: Vec<Bytes>,
}

/// Everything read or written while executing one rollup block's single
/// transaction against its pre-state.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDiffProof {
    pub header: StateDiffHeader,
    pub account_state_proofs: Vec<AccountStateProof>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDiffHeader {
    #[serde(with = "alloy::serde::quantity")]
    pub number: u64,
    pub state_root: B256,
}

/// The self-contained bundle a dispute runs on: batch proofs anchoring the
/// pre/post roots and the transaction, the state-diff witness, and live trie
/// views that track the transitioner's commitments.
#[derive(Debug)]
pub struct FraudProofData {
    pub pre_state_root_proof: StateRootBatchProof,
    pub post_state_root_proof: StateRootBatchProof,
    pub transaction_proof: TransactionBatchProof,
    pub state_diff_proof: StateDiffProof,
    pub state_trie: Trie,
    pub storage_tries: HashMap<Address, Trie>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_diff_proof_parses_the_rpc_wire_format() {
        let raw = r#"{
            "header": {
                "number": "0x8",
                "stateRoot": "0x56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421"
            },
            "accountStateProofs": [
                {
                    "address": "0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1",
                    "nonce": "0x1",
                    "balance": "0x64",
                    "codeHash": "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470",
                    "storageRoot": "0x56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421",
                    "accountProof": ["0xf851808080"],
                    "storageProof": [
                        {
                            "key": "0x0000000000000000000000000000000000000000000000000000000000000001",
                            "value": "0x000000000000000000000000000000000000000000000000000000000000002a",
                            "proof": ["0xe2a0deadbeef"]
                        }
                    ]
                }
            ]
        }"#;

        let parsed: StateDiffProof = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.header.number, 8);
        assert_eq!(parsed.account_state_proofs.len(), 1);

        let account = &parsed.account_state_proofs[0];
        assert_eq!(account.address, Address::repeat_byte(0xa1));
        assert_eq!(account.nonce, 1);
        assert_eq!(account.balance, U256::from(100u64));
        assert_eq!(account.account_proof.len(), 1);
        assert_eq!(account.storage_proof[0].value, {
            let mut w = [0u8; 32];
            w[31] = 0x2a;
            B256::from(w)
        });
    }
}
