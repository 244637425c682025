//! In-memory Merkle-Patricia tries reconstructed from proof witnesses.
//!
//! The tries built here are *partial*: they hold exactly the nodes that some
//! set of inclusion proofs happened to carry, and replace every other subtree
//! with a [`Hash`][node::Node::Hash] node containing its merkle digest. A
//! partial trie hashes to the same root as the full trie it was carved from,
//! which is what makes it usable as a local working copy of on-chain state:
//! values along witnessed paths can be read, updated and re-proven without
//! ever materializing the full state.
//!
//! Construction starts from a [`TrieBuilder`], which unions any number of
//! proof node lists into a content-addressed store and resolves them into a
//! [`Trie`] rooted at a given hash.

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

pub mod builder;
pub mod error;
pub mod hashing;
pub mod nibbles;
pub mod node;
pub mod proof;
pub mod trie;

pub use builder::TrieBuilder;
pub use error::{TrieError, TrieResult};
pub use hashing::EMPTY_TRIE_HASH;
pub use nibbles::Nibbles;
pub use node::Node;
pub use proof::{create_proof, verify_proof};
pub use trie::Trie;
