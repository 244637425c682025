//! A builder for constructing a partial trie from a collection of proofs.

use std::collections::HashMap;

use ethereum_types::H256;
use keccak_hash::keccak;
use log::trace;
use rlp::Rlp;

use crate::{
    error::{TrieError, TrieResult},
    hashing::EMPTY_TRIE_HASH,
    nibbles::Nibbles,
    node::Node,
    trie::Trie,
};

/// Accumulates trie nodes from any number of inclusion proofs into a
/// content-addressed store, then resolves them into a [`Trie`].
///
/// Insertion is order-independent: the resulting store is the union of the
/// node sets, keyed by keccak digest. Nodes referenced by the trie but absent
/// from the store become [`Node::Hash`] stand-ins.
#[derive(Debug, Default)]
pub struct TrieBuilder {
    nodes: HashMap<H256, Vec<u8>>,
}

impl TrieBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the nodes of one proof into the store.
    ///
    /// Fails with [`TrieError::ConflictingNode`] if a node hash is already
    /// present with different bytes.
    pub fn insert_proof<I, B>(&mut self, proof: I) -> TrieResult<()>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        for node in proof {
            let bytes = node.as_ref();
            let hash = keccak(bytes);
            match self.nodes.get(&hash) {
                Some(existing) if existing != bytes => {
                    return Err(TrieError::ConflictingNode(hash));
                }
                Some(_) => {}
                None => {
                    self.nodes.insert(hash, bytes.to_vec());
                }
            }
        }
        Ok(())
    }

    /// The number of distinct nodes accumulated so far.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Resolves the store into a trie rooted at `root`.
    pub fn build(&self, root: H256) -> TrieResult<Trie> {
        trace!("building trie for root {root:x} from {} nodes", self.len());
        Ok(Trie::new(resolve_hash(root, &self.nodes)?))
    }
}

fn resolve_hash(hash: H256, nodes: &HashMap<H256, Vec<u8>>) -> TrieResult<Node> {
    match nodes.get(&hash) {
        Some(bytes) => decode_node(&Rlp::new(bytes), nodes),
        None if hash.is_zero() || hash == EMPTY_TRIE_HASH => Ok(Node::Empty),
        None => Ok(Node::Hash(hash)),
    }
}

fn decode_node(rlp: &Rlp, nodes: &HashMap<H256, Vec<u8>>) -> TrieResult<Node> {
    match rlp.item_count()? {
        17 => {
            let mut branch = Node::empty_branch();
            let Node::Branch {
                ref mut children,
                ref mut value,
            } = branch
            else {
                unreachable!()
            };
            for (i, child) in children.iter_mut().enumerate() {
                *child = decode_child(rlp.at(i)?, nodes)?;
            }
            *value = rlp.at(16)?.data()?.to_vec();
            Ok(branch)
        }
        2 => {
            let (path, is_leaf) = Nibbles::from_hex_prefix_encoding(rlp.at(0)?.data()?)?;
            match is_leaf {
                true => Ok(Node::Leaf {
                    path,
                    value: rlp.at(1)?.data()?.to_vec(),
                }),
                false => Ok(Node::Extension {
                    path,
                    child: Box::new(decode_child(rlp.at(1)?, nodes)?),
                }),
            }
        }
        n => Err(TrieError::InvalidNode(format!(
            "unexpected trie node arity {n}"
        ))),
    }
}

fn decode_child(rlp: Rlp, nodes: &HashMap<H256, Vec<u8>>) -> TrieResult<Node> {
    // A child shorter than 32 bytes is a whole node inlined by its parent;
    // otherwise it is a 32-byte reference into the store.
    if rlp.is_list() {
        return decode_node(&rlp, nodes);
    }
    let data = rlp.data()?;
    match data.len() {
        0 => Ok(Node::Empty),
        32 => resolve_hash(H256::from_slice(data), nodes),
        n => Err(TrieError::InvalidNode(format!(
            "child reference of {n} bytes"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::create_proof;

    fn sample_trie() -> Trie {
        let mut trie = Trie::default();
        for (k, v) in [
            (&b"doe"[..], &b"reindeer"[..]),
            (b"dog", b"puppy"),
            (b"dogglesworth", b"cat"),
            (b"horse", b"stallion"),
        ] {
            trie.insert(Nibbles::from_bytes_be(k), v.to_vec()).unwrap();
        }
        trie
    }

    #[test]
    fn rebuilds_from_proofs_order_independently() {
        let trie = sample_trie();
        let root = trie.hash();

        let proofs: Vec<Vec<Vec<u8>>> = [&b"doe"[..], b"dog", b"horse"]
            .iter()
            .map(|k| create_proof(&trie, &Nibbles::from_bytes_be(k)).unwrap())
            .collect();

        let mut forward = TrieBuilder::new();
        for p in &proofs {
            forward.insert_proof(p).unwrap();
        }
        let mut backward = TrieBuilder::new();
        for p in proofs.iter().rev() {
            backward.insert_proof(p).unwrap();
        }

        let a = forward.build(root).unwrap();
        let b = backward.build(root).unwrap();
        assert_eq!(a.hash(), root);
        assert_eq!(b.hash(), root);

        // Witnessed keys resolve; the unwitnessed subtree stays pruned.
        let dog = Nibbles::from_bytes_be(b"dog");
        assert_eq!(a.get(&dog).unwrap(), Some(&b"puppy"[..]));
    }

    #[test]
    fn empty_roots_resolve_to_empty_tries() {
        let builder = TrieBuilder::new();
        assert_eq!(builder.build(H256::zero()).unwrap().hash(), EMPTY_TRIE_HASH);
        assert_eq!(
            builder.build(EMPTY_TRIE_HASH).unwrap().hash(),
            EMPTY_TRIE_HASH
        );
    }

    #[test]
    fn unknown_root_stays_pruned() {
        let root = H256::repeat_byte(0x42);
        let trie = TrieBuilder::new().build(root).unwrap();
        assert_eq!(trie.hash(), root);
        assert!(trie.get(&Nibbles::from_bytes_be(b"dog")).is_err());
    }

    #[test]
    fn duplicate_nodes_are_deduplicated() {
        let trie = sample_trie();
        let proof = create_proof(&trie, &Nibbles::from_bytes_be(b"dog")).unwrap();

        let mut builder = TrieBuilder::new();
        builder.insert_proof(&proof).unwrap();
        let n = builder.len();
        builder.insert_proof(&proof).unwrap();
        assert_eq!(builder.len(), n);
    }
}
