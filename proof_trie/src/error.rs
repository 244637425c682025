//! Error types shared by all trie operations.

use ethereum_types::H256;
use thiserror::Error;

/// Stores the result of trie operations. Returns a [`TrieError`] upon
/// failure.
pub type TrieResult<T> = Result<T, TrieError>;

/// An error raised while building, traversing or mutating a partial trie.
#[derive(Clone, Debug, Eq, Error, Hash, PartialEq)]
pub enum TrieError {
    /// The traversal reached a `Hash` node, i.e. a subtree the witness does
    /// not cover. The operation cannot be answered from the available nodes.
    #[error("witness does not contain the node for hash {0:x}")]
    MissingNode(H256),

    /// Two proofs carried different byte strings for the same node hash.
    #[error("conflicting witness bytes for node hash {0:x}")]
    ConflictingNode(H256),

    /// A witness node failed to parse as a valid trie node.
    #[error("malformed witness node: {0}")]
    InvalidNode(String),
}

impl From<rlp::DecoderError> for TrieError {
    fn from(e: rlp::DecoderError) -> Self {
        TrieError::InvalidNode(e.to_string())
    }
}
