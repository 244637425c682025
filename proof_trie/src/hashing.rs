//! Canonical RLP encoding and keccak hashing of trie nodes.

use bytes::Bytes;
use ethereum_types::H256;
use keccak_hash::keccak;
use rlp::RlpStream;

use crate::node::Node;

/// The hash of an empty trie, `keccak(rlp(""))`.
pub const EMPTY_TRIE_HASH: H256 = H256([
    0x56, 0xe8, 0x1f, 0x17, 0x1b, 0xcc, 0x55, 0xa6, 0xff, 0x83, 0x45, 0xe6, 0x92, 0xc0, 0xf8, 0x6e,
    0x5b, 0x48, 0xe0, 0x1b, 0x99, 0x6c, 0xad, 0xc0, 0x01, 0x62, 0x2f, 0xb5, 0xe3, 0x63, 0xb4, 0x21,
]);

/// A node as it appears inside its parent's encoding.
#[derive(Clone, Debug)]
pub enum EncodedNode {
    /// Node whose RLP is shorter than 32 bytes; inlined verbatim.
    Raw(Bytes),
    /// Node replaced by the keccak of its RLP.
    Hashed([u8; 32]),
}

impl From<&EncodedNode> for H256 {
    fn from(v: &EncodedNode) -> Self {
        match v {
            EncodedNode::Raw(b) => keccak(b),
            EncodedNode::Hashed(h) => H256(*h),
        }
    }
}

/// Computes the merkle root of the (sub)trie under `node`.
pub fn hash_node(node: &Node) -> H256 {
    (&encode_node(node)).into()
}

/// Encodes a node the way its parent refers to it: inline if the RLP is
/// shorter than 32 bytes, by hash otherwise.
pub(crate) fn encode_node(node: &Node) -> EncodedNode {
    match node {
        Node::Empty => EncodedNode::Raw(Bytes::from_static(&rlp::NULL_RLP)),
        Node::Hash(h) => EncodedNode::Hashed(h.0),
        _ => {
            let bytes = node_rlp(node);
            match bytes.len() < 32 {
                true => EncodedNode::Raw(bytes),
                false => EncodedNode::Hashed(keccak(&bytes).0),
            }
        }
    }
}

/// The full RLP encoding of a node, children referenced per [`encode_node`].
///
/// For `Hash` nodes the preimage is unknown; callers must not ask for it.
pub(crate) fn node_rlp(node: &Node) -> Bytes {
    match node {
        Node::Empty => Bytes::from_static(&rlp::NULL_RLP),
        Node::Hash(_) => unreachable!("pruned nodes have no known preimage"),
        Node::Branch { children, value } => {
            let mut stream = RlpStream::new_list(17);
            for c in children.iter() {
                append_to_stream(&mut stream, encode_node(c));
            }
            match value.is_empty() {
                false => stream.append(value),
                true => stream.append_empty_data(),
            };
            stream.out().into()
        }
        Node::Extension { path, child } => {
            let mut stream = RlpStream::new_list(2);
            stream.append(&path.to_hex_prefix_encoding(false));
            append_to_stream(&mut stream, encode_node(child));
            stream.out().into()
        }
        Node::Leaf { path, value } => {
            let mut stream = RlpStream::new_list(2);
            stream.append(&path.to_hex_prefix_encoding(true));
            stream.append(value);
            stream.out().into()
        }
    }
}

fn append_to_stream(s: &mut RlpStream, node: EncodedNode) {
    match node {
        EncodedNode::Raw(b) => s.append_raw(&b, 1),
        EncodedNode::Hashed(h) => s.append(&h.to_vec()),
    };
}
