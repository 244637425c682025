//! Canonical wire encodings: account state, storage slot values, and the
//! RLP node lists submitted on-chain as trie witnesses.

use alloy::primitives::{B256, U256};
use rlp::RlpStream;

use crate::compat::Compat;

/// RLP encoding of an account as stored in the state trie:
/// `rlp([nonce, balance, storageRoot, codeHash])` with the integers in
/// minimal big-endian form.
pub fn encode_account(nonce: u64, balance: U256, storage_root: B256, code_hash: B256) -> Vec<u8> {
    let mut stream = RlpStream::new_list(4);
    stream.append(&nonce);
    stream.append(&balance.compat());
    stream.append(&storage_root.compat());
    stream.append(&code_hash.compat());
    stream.out().to_vec()
}

/// RLP encoding of a storage slot value: the leading-zero-stripped big-endian
/// bytes of the word. The zero word encodes as the empty string.
pub fn encode_storage_value(value: B256) -> Vec<u8> {
    let stripped: Vec<u8> = value
        .as_slice()
        .iter()
        .copied()
        .skip_while(|b| *b == 0)
        .collect();
    rlp::encode(&stripped).to_vec()
}

/// The on-chain witness format for inclusion proofs: an RLP list whose items
/// are the raw trie node byte strings, root first.
pub fn encode_trie_witness<B: AsRef<[u8]>>(nodes: &[B]) -> Vec<u8> {
    let mut stream = RlpStream::new_list(nodes.len());
    for node in nodes {
        stream.append(&node.as_ref().to_vec());
    }
    stream.out().to_vec()
}

#[cfg(test)]
mod tests {
    use proof_trie::EMPTY_TRIE_HASH;

    use super::*;
    use crate::compat::Compat;

    // keccak256 of the empty byte string.
    const KECCAK_EMPTY: [u8; 32] = [
        0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03,
        0xc0, 0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85,
        0xa4, 0x70,
    ];

    #[test]
    fn empty_account_matches_reference_rlp() {
        let encoded = encode_account(
            0,
            U256::ZERO,
            EMPTY_TRIE_HASH.compat(),
            B256::from(KECCAK_EMPTY),
        );
        let expected = hex::decode(
            "f8448080a056e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421a0c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470",
        )
        .unwrap();
        assert_eq!(encoded, expected);
    }

    #[test]
    fn account_integers_are_minimal() {
        let encoded = encode_account(1, U256::from(0x0100u64), B256::ZERO, B256::ZERO);
        let decoded = rlp::Rlp::new(&encoded);
        assert_eq!(decoded.item_count().unwrap(), 4);
        assert_eq!(decoded.at(0).unwrap().data().unwrap(), &[0x01]);
        assert_eq!(decoded.at(1).unwrap().data().unwrap(), &[0x01, 0x00]);
    }

    #[test]
    fn storage_values_strip_leading_zeros() {
        let mut word = [0u8; 32];
        word[31] = 0x01;
        assert_eq!(encode_storage_value(B256::from(word)), vec![0x01]);

        let mut word = [0u8; 32];
        word[30] = 0x01;
        assert_eq!(encode_storage_value(B256::from(word)), vec![0x82, 0x01, 0x00]);

        assert_eq!(encode_storage_value(B256::ZERO), vec![0x80]);
    }

    #[test]
    fn witness_lists_round_trip() {
        let nodes: Vec<Vec<u8>> = vec![vec![0xaa; 40], vec![0xbb; 10]];
        let encoded = encode_trie_witness(&nodes);

        let decoded = rlp::Rlp::new(&encoded);
        assert_eq!(decoded.item_count().unwrap(), 2);
        assert_eq!(decoded.at(0).unwrap().data().unwrap(), &nodes[0][..]);
        assert_eq!(decoded.at(1).unwrap().data().unwrap(), &nodes[1][..]);
    }
}
