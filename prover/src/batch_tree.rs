//! The canonical Merkle tree over batch elements.
//!
//! Batches posted to the chain contracts commit to their elements with a
//! keccak-256 binary tree: leaves are padded to the next power of two with
//! default leaves (`keccak256("")`), and each parent is the keccak of its
//! children's concatenation.

use alloy::primitives::{keccak256, B256};

/// The padding leaf used to fill a batch out to a power of two.
fn default_leaf() -> B256 {
    keccak256([])
}

fn parent(left: B256, right: B256) -> B256 {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(left.as_slice());
    buf[32..].copy_from_slice(right.as_slice());
    keccak256(buf)
}

fn padded(leaves: &[B256]) -> Vec<B256> {
    let target = leaves.len().next_power_of_two();
    let mut level = leaves.to_vec();
    level.resize(target, default_leaf());
    level
}

/// The root committing to `leaves`. A single leaf is its own root.
pub fn root(leaves: &[B256]) -> B256 {
    if leaves.is_empty() {
        return default_leaf();
    }
    let mut level = padded(leaves);
    while level.len() > 1 {
        level = level
            .chunks_exact(2)
            .map(|pair| parent(pair[0], pair[1]))
            .collect();
    }
    level[0]
}

/// The sibling path proving `leaves[index]` against [`root`], bottom-up.
///
/// Panics if `index` is out of range.
pub fn siblings(leaves: &[B256], index: usize) -> Vec<B256> {
    assert!(index < leaves.len(), "leaf index out of range");

    let mut level = padded(leaves);
    let mut position = index;
    let mut path = Vec::new();

    while level.len() > 1 {
        path.push(level[position ^ 1]);
        level = level
            .chunks_exact(2)
            .map(|pair| parent(pair[0], pair[1]))
            .collect();
        position /= 2;
    }

    path
}

/// Verifies a sibling path produced by [`siblings`].
pub fn verify(root_hash: B256, leaf: B256, index: usize, siblings: &[B256]) -> bool {
    let mut acc = leaf;
    let mut position = index;
    for sibling in siblings {
        acc = match position % 2 {
            0 => parent(acc, *sibling),
            _ => parent(*sibling, acc),
        };
        position /= 2;
    }
    acc == root_hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: usize) -> Vec<B256> {
        (0..n as u8).map(B256::repeat_byte).collect()
    }

    #[test]
    fn single_leaf_is_its_own_root() {
        let l = leaves(1);
        assert_eq!(root(&l), l[0]);
        assert!(verify(root(&l), l[0], 0, &siblings(&l, 0)));
    }

    #[test]
    fn every_leaf_verifies() {
        for n in [2usize, 3, 4, 5, 7, 8, 16] {
            let l = leaves(n);
            let r = root(&l);
            for (i, leaf) in l.iter().enumerate() {
                let path = siblings(&l, i);
                assert_eq!(path.len(), n.next_power_of_two().trailing_zeros() as usize);
                assert!(verify(r, *leaf, i, &path), "leaf {i} of {n}");
            }
        }
    }

    #[test]
    fn wrong_leaf_does_not_verify() {
        let l = leaves(5);
        let r = root(&l);
        let path = siblings(&l, 2);
        assert!(!verify(r, l[3], 2, &path));
        assert!(!verify(r, l[2], 3, &path));
    }

    #[test]
    fn root_depends_on_order() {
        let l = leaves(4);
        let mut swapped = l.clone();
        swapped.swap(0, 1);
        assert_ne!(root(&l), root(&swapped));
    }
}
