//! Inclusion-proof generation and verification against partial tries.

use ethereum_types::H256;

use crate::{
    builder::TrieBuilder,
    error::{TrieError, TrieResult},
    hashing::node_rlp,
    nibbles::Nibbles,
    node::Node,
    trie::Trie,
};

/// Generates the inclusion proof for `key`: the RLP encodings of every
/// standalone node on the key's path, root first.
///
/// Nodes shorter than 32 bytes are inlined into their parent's encoding and
/// therefore do not appear as separate proof entries. If the path ends before
/// the key is exhausted the returned nodes prove *exclusion*, which is still
/// a valid proof. Fails with [`TrieError::MissingNode`] when the path runs
/// into a pruned subtree.
pub fn create_proof(trie: &Trie, key: &Nibbles) -> TrieResult<Vec<Vec<u8>>> {
    let mut proof = Vec::new();
    let mut node = trie.root_node();
    let mut path = key.clone();
    let mut is_root = true;

    loop {
        match node {
            Node::Empty => return Ok(proof),
            Node::Hash(h) => return Err(TrieError::MissingNode(*h)),
            _ => {}
        }

        let encoded = node_rlp(node);
        if is_root || encoded.len() >= 32 {
            proof.push(encoded.to_vec());
        }
        is_root = false;

        match node {
            Node::Leaf { .. } => return Ok(proof),
            Node::Extension {
                path: ext_path,
                child,
            } => {
                if path.common_prefix_len(ext_path) < ext_path.len() {
                    return Ok(proof);
                }
                path = path.truncate_n_nibbles_front(ext_path.len());
                node = child;
            }
            Node::Branch { children, .. } => {
                if path.is_empty() {
                    return Ok(proof);
                }
                let nibble = path.pop_next_nibble_front();
                node = &children[nibble as usize];
            }
            Node::Empty | Node::Hash(_) => unreachable!(),
        }
    }
}

/// Verifies an inclusion proof against `root`, returning the proven value,
/// `None` for a proof of exclusion, or an error for a proof that does not
/// connect `root` to the key.
pub fn verify_proof<B: AsRef<[u8]>>(
    root: H256,
    key: &Nibbles,
    proof: &[B],
) -> TrieResult<Option<Vec<u8>>> {
    let mut builder = TrieBuilder::new();
    builder.insert_proof(proof)?;
    let trie = builder.build(root)?;
    trie.get(key).map(|v| v.map(<[u8]>::to_vec))
}
