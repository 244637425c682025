//! The partial-trie node representation.

use ethereum_types::H256;
use serde::{Deserialize, Serialize};

use crate::nibbles::Nibbles;

/// A node in a partial Merkle-Patricia trie.
///
/// This mimics the structure of an Ethereum trie, except for the additional
/// `Hash` variant, which stands in for a subtree whose contents were not part
/// of the witness. A `Hash` node contributes its digest to root computation
/// but cannot be traversed.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum Node {
    /// An empty trie.
    #[default]
    Empty,
    /// The digest of a subtree whose nodes are not stored.
    ///
    /// Only subtrees whose RLP encoding is >= 32 bytes may be replaced with a
    /// hash node; smaller nodes are inlined into their parent by the
    /// encoding, so hashing them would change the parent's digest.
    Hash(H256),
    /// A branch node: 16 children and an optional value.
    Branch {
        children: Box<[Node; 16]>,
        value: Vec<u8>,
    },
    /// An extension node: a shared path segment and a single child.
    Extension { path: Nibbles, child: Box<Node> },
    /// A leaf node: the remaining path and a value.
    Leaf { path: Nibbles, value: Vec<u8> },
}

impl Node {
    /// A branch with all-empty children and no value.
    pub(crate) fn empty_branch() -> Node {
        Node::Branch {
            children: Box::new(std::array::from_fn(|_| Node::Empty)),
            value: Vec::new(),
        }
    }
}
