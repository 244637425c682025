//! The mutable partial-trie working view.

use ethereum_types::H256;
use log::trace;
use parking_lot::RwLock;

use crate::{
    error::{TrieError, TrieResult},
    hashing::hash_node,
    nibbles::Nibbles,
    node::Node,
};

/// A partial Merkle-Patricia trie with a lazily cached root hash.
///
/// The cache is invalidated on every mutation and recomputed on the next
/// [`hash`][Trie::hash] call, so repeated reads of an unchanged trie do not
/// re-walk it.
#[derive(Debug, Default)]
pub struct Trie {
    root: Node,
    cached_hash: RwLock<Option<H256>>,
}

impl Trie {
    pub fn new(root: Node) -> Self {
        Trie {
            root,
            cached_hash: RwLock::new(None),
        }
    }

    /// The merkle root of the trie.
    pub fn hash(&self) -> H256 {
        if let Some(h) = *self.cached_hash.read() {
            return h;
        }
        let h = hash_node(&self.root);
        *self.cached_hash.write() = Some(h);
        h
    }

    /// Looks up the value stored at `key`.
    ///
    /// Returns `Ok(None)` when the trie provably does not contain the key and
    /// [`TrieError::MissingNode`] when the answer lies in a pruned subtree.
    pub fn get(&self, key: &Nibbles) -> TrieResult<Option<&[u8]>> {
        let mut node = &self.root;
        let mut path = key.clone();

        loop {
            match node {
                Node::Empty => return Ok(None),
                Node::Hash(h) => return Err(TrieError::MissingNode(*h)),
                Node::Leaf {
                    path: leaf_path,
                    value,
                } => {
                    return Ok((*leaf_path == path).then_some(value.as_slice()));
                }
                Node::Extension {
                    path: ext_path,
                    child,
                } => {
                    if path.common_prefix_len(ext_path) < ext_path.len() {
                        return Ok(None);
                    }
                    path = path.truncate_n_nibbles_front(ext_path.len());
                    node = child;
                }
                Node::Branch { children, value } => {
                    if path.is_empty() {
                        return Ok((!value.is_empty()).then_some(value.as_slice()));
                    }
                    let nibble = path.pop_next_nibble_front();
                    node = &children[nibble as usize];
                }
            }
        }
    }

    /// Inserts `value` at `key`, replacing any existing value.
    ///
    /// Fails with [`TrieError::MissingNode`] when the key's path runs through
    /// a pruned subtree; the trie is left unchanged in that case.
    pub fn insert(&mut self, key: Nibbles, value: Vec<u8>) -> TrieResult<()> {
        trace!("inserting {} ({} bytes)", key, value.len());
        insert_into(&mut self.root, key, value)?;
        *self.cached_hash.write() = None;
        Ok(())
    }

    pub(crate) fn root_node(&self) -> &Node {
        &self.root
    }
}

fn insert_into(node: &mut Node, mut path: Nibbles, value: Vec<u8>) -> TrieResult<()> {
    match node {
        Node::Empty => {
            *node = Node::Leaf { path, value };
            Ok(())
        }
        Node::Hash(h) => Err(TrieError::MissingNode(*h)),
        Node::Leaf {
            path: leaf_path,
            value: leaf_value,
        } => {
            let common = leaf_path.common_prefix_len(&path);
            if common == leaf_path.len() && common == path.len() {
                *leaf_value = value;
                return Ok(());
            }

            let existing = leaf_slot(
                leaf_path.truncate_n_nibbles_front(common),
                std::mem::take(leaf_value),
            );
            let prefix = path.prefix(common);
            let new = (path.truncate_n_nibbles_front(common), value);
            *node = split_into_branch(prefix, existing, new);
            Ok(())
        }
        Node::Extension {
            path: ext_path,
            child,
        } => {
            let common = ext_path.common_prefix_len(&path);
            if common == ext_path.len() {
                return insert_into(child, path.truncate_n_nibbles_front(common), value);
            }

            // The new key diverges inside the extension's segment: split it.
            let mut ext_rest = ext_path.truncate_n_nibbles_front(common);
            let old_child = std::mem::take(child.as_mut());
            let nibble = ext_rest.pop_next_nibble_front();
            let relocated = match ext_rest.is_empty() {
                true => old_child,
                false => Node::Extension {
                    path: ext_rest,
                    child: Box::new(old_child),
                },
            };
            let prefix = path.prefix(common);
            let new = (path.truncate_n_nibbles_front(common), value);
            *node = split_into_branch(prefix, BranchSlot::Child(nibble, relocated), new);
            Ok(())
        }
        Node::Branch {
            children,
            value: branch_value,
        } => {
            if path.is_empty() {
                *branch_value = value;
                return Ok(());
            }
            let nibble = path.pop_next_nibble_front();
            insert_into(&mut children[nibble as usize], path, value)
        }
    }
}

/// Where a relocated occupant lands when a node is split into a branch.
enum BranchSlot {
    /// The occupant's path is exhausted: it becomes the branch value.
    Value(Vec<u8>),
    /// The occupant moves under one of the branch's children.
    Child(u8, Node),
}

/// Repackages the remainder of a split leaf as a branch occupant.
fn leaf_slot(mut rest: Nibbles, value: Vec<u8>) -> BranchSlot {
    match rest.is_empty() {
        true => BranchSlot::Value(value),
        false => {
            let nibble = rest.pop_next_nibble_front();
            BranchSlot::Child(nibble, Node::Leaf { path: rest, value })
        }
    }
}

/// Builds the branch (optionally wrapped in an extension over `prefix`) that
/// holds a relocated existing occupant and a newly inserted value.
fn split_into_branch(prefix: Nibbles, existing: BranchSlot, new: (Nibbles, Vec<u8>)) -> Node {
    let mut branch = Node::empty_branch();
    let Node::Branch {
        ref mut children,
        ref mut value,
    } = branch
    else {
        unreachable!()
    };

    match existing {
        BranchSlot::Value(v) => *value = v,
        BranchSlot::Child(nibble, node) => children[nibble as usize] = node,
    }

    let (new_rest, new_value) = new;
    match leaf_slot(new_rest, new_value) {
        BranchSlot::Value(v) => *value = v,
        BranchSlot::Child(nibble, node) => children[nibble as usize] = node,
    }

    match prefix.is_empty() {
        true => branch,
        false => Node::Extension {
            path: prefix,
            child: Box::new(branch),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EMPTY_TRIE_HASH;

    fn key(bytes: &[u8]) -> Nibbles {
        Nibbles::from_bytes_be(bytes)
    }

    #[test]
    fn empty_trie_has_canonical_hash() {
        assert_eq!(Trie::default().hash(), EMPTY_TRIE_HASH);
    }

    #[test]
    fn get_after_insert() {
        let mut trie = Trie::default();
        trie.insert(key(b"doe"), b"reindeer".to_vec()).unwrap();
        trie.insert(key(b"dog"), b"puppy".to_vec()).unwrap();
        trie.insert(key(b"dogglesworth"), b"cat".to_vec()).unwrap();

        assert_eq!(trie.get(&key(b"doe")).unwrap(), Some(&b"reindeer"[..]));
        assert_eq!(trie.get(&key(b"dog")).unwrap(), Some(&b"puppy"[..]));
        assert_eq!(
            trie.get(&key(b"dogglesworth")).unwrap(),
            Some(&b"cat"[..])
        );
        assert_eq!(trie.get(&key(b"doge")).unwrap(), None);
    }

    #[test]
    fn matches_reference_root() {
        // Fixture from the canonical ethereum trie test suite ("puppy" case).
        let mut trie = Trie::default();
        trie.insert(key(b"doe"), b"reindeer".to_vec()).unwrap();
        trie.insert(key(b"dog"), b"puppy".to_vec()).unwrap();
        trie.insert(key(b"dogglesworth"), b"cat".to_vec()).unwrap();

        let expected: H256 = {
            let bytes =
                hex::decode("8aad789dff2f538bca5d8ea56e8abe10f4c7ba3a5dea95fea4cd6e7c3a1168d3")
                    .unwrap();
            H256::from_slice(&bytes)
        };
        assert_eq!(trie.hash(), expected);
    }

    #[test]
    fn replacing_a_value_changes_the_root() {
        let mut trie = Trie::default();
        trie.insert(key(b"k1"), vec![1]).unwrap();
        let before = trie.hash();

        trie.insert(key(b"k1"), vec![2]).unwrap();
        assert_ne!(trie.hash(), before);
        assert_eq!(trie.get(&key(b"k1")).unwrap(), Some(&[2u8][..]));
    }

    #[test]
    fn insert_order_does_not_matter() {
        let pairs: Vec<(&[u8], Vec<u8>)> = vec![
            (b"abc", vec![1]),
            (b"abd", vec![2]),
            (b"b", vec![3]),
            (b"abcd", vec![4]),
        ];

        let mut forward = Trie::default();
        for (k, v) in &pairs {
            forward.insert(key(k), v.clone()).unwrap();
        }
        let mut backward = Trie::default();
        for (k, v) in pairs.iter().rev() {
            backward.insert(key(k), v.clone()).unwrap();
        }

        assert_eq!(forward.hash(), backward.hash());
    }

    #[test]
    fn insert_through_pruned_subtree_fails_without_corruption() {
        let mut trie = Trie::new(Node::Hash(H256::repeat_byte(0xaa)));
        let before = trie.hash();

        let err = trie.insert(key(b"dog"), vec![1]).unwrap_err();
        assert!(matches!(err, TrieError::MissingNode(_)));
        assert_eq!(trie.hash(), before);
    }

    #[test]
    fn branch_value_on_exhausted_path() {
        let mut trie = Trie::default();
        // "do" is a strict prefix of "dog" at the nibble level.
        trie.insert(key(b"do"), b"verb".to_vec()).unwrap();
        trie.insert(key(b"dog"), b"puppy".to_vec()).unwrap();

        assert_eq!(trie.get(&key(b"do")).unwrap(), Some(&b"verb"[..]));
        assert_eq!(trie.get(&key(b"dog")).unwrap(), Some(&b"puppy"[..]));
    }
}
