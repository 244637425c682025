//! Hex-nibble key paths used for trie traversal.

use ethereum_types::H256;
use serde::{Deserialize, Serialize};

use crate::error::{TrieError, TrieResult};

/// A path of hex nibbles, most-significant first.
///
/// Keys entering the trie are byte strings; every byte contributes two
/// nibbles. Node paths recovered from hex-prefix ("compact") encodings may
/// have odd length.
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Nibbles {
    nibbles: Vec<u8>,
}

impl Nibbles {
    /// Creates a path from big-endian bytes, two nibbles per byte.
    pub fn from_bytes_be(bytes: &[u8]) -> Self {
        let mut nibbles = Vec::with_capacity(bytes.len() * 2);
        for b in bytes {
            nibbles.push(b >> 4);
            nibbles.push(b & 0x0f);
        }
        Nibbles { nibbles }
    }

    /// Decodes a hex-prefix ("compact") encoded path. Returns the path and
    /// whether the flag nibble marked it as a leaf.
    pub fn from_hex_prefix_encoding(bytes: &[u8]) -> TrieResult<(Self, bool)> {
        let first = *bytes
            .first()
            .ok_or_else(|| TrieError::InvalidNode("empty hex-prefix encoding".into()))?;
        let flag = first >> 4;
        if flag > 3 {
            return Err(TrieError::InvalidNode(format!(
                "invalid hex-prefix flag nibble {flag}"
            )));
        }

        let is_leaf = flag >= 2;
        let odd = flag & 1 == 1;

        let mut nibbles = Vec::with_capacity(bytes.len() * 2);
        if odd {
            nibbles.push(first & 0x0f);
        }
        for b in &bytes[1..] {
            nibbles.push(b >> 4);
            nibbles.push(b & 0x0f);
        }

        Ok((Nibbles { nibbles }, is_leaf))
    }

    /// Encodes the path with the hex-prefix ("compact") scheme.
    pub fn to_hex_prefix_encoding(&self, is_leaf: bool) -> Vec<u8> {
        let odd = self.nibbles.len() % 2 == 1;
        let flag = (is_leaf as u8) * 2 + odd as u8;

        let mut out = Vec::with_capacity(1 + self.nibbles.len() / 2);
        let rest = match odd {
            true => {
                out.push(flag << 4 | self.nibbles[0]);
                &self.nibbles[1..]
            }
            false => {
                out.push(flag << 4);
                &self.nibbles[..]
            }
        };
        for pair in rest.chunks_exact(2) {
            out.push(pair[0] << 4 | pair[1]);
        }

        out
    }

    pub fn len(&self) -> usize {
        self.nibbles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nibbles.is_empty()
    }

    /// The nibble at position `i`. Panics if out of range.
    pub fn at(&self, i: usize) -> u8 {
        self.nibbles[i]
    }

    /// Removes and returns the first nibble. Panics on an empty path.
    pub fn pop_next_nibble_front(&mut self) -> u8 {
        self.nibbles.remove(0)
    }

    /// The path with its first `n` nibbles dropped.
    pub fn truncate_n_nibbles_front(&self, n: usize) -> Self {
        Nibbles {
            nibbles: self.nibbles[n..].to_vec(),
        }
    }

    /// The first `n` nibbles of the path.
    pub fn prefix(&self, n: usize) -> Self {
        Nibbles {
            nibbles: self.nibbles[..n].to_vec(),
        }
    }

    /// Length of the longest common prefix with `other`.
    pub fn common_prefix_len(&self, other: &Self) -> usize {
        self.nibbles
            .iter()
            .zip(other.nibbles.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }
}

impl From<H256> for Nibbles {
    fn from(h: H256) -> Self {
        Nibbles::from_bytes_be(h.as_bytes())
    }
}

impl From<&[u8]> for Nibbles {
    fn from(bytes: &[u8]) -> Self {
        Nibbles::from_bytes_be(bytes)
    }
}

impl std::fmt::Display for Nibbles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x")?;
        for n in &self.nibbles {
            write!(f, "{n:x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_expand_to_two_nibbles_each() {
        let n = Nibbles::from_bytes_be(&[0xab, 0x07]);
        assert_eq!(n.len(), 4);
        assert_eq!((n.at(0), n.at(1), n.at(2), n.at(3)), (0xa, 0xb, 0x0, 0x7));
    }

    #[test]
    fn hex_prefix_round_trips() {
        for (raw, is_leaf) in [
            (vec![0x1u8, 0x2, 0x3, 0x4], false),
            (vec![0x1, 0x2, 0x3], false),
            (vec![0xf], true),
            (vec![], true),
            (vec![0x0, 0x0], false),
        ] {
            let n = Nibbles {
                nibbles: raw.clone(),
            };
            let enc = n.to_hex_prefix_encoding(is_leaf);
            let (dec, leaf) = Nibbles::from_hex_prefix_encoding(&enc).unwrap();
            assert_eq!(dec, n, "path {raw:x?}");
            assert_eq!(leaf, is_leaf);
        }
    }

    #[test]
    fn hex_prefix_known_vectors() {
        // Examples from the yellow-paper compact encoding description.
        let (n, leaf) = Nibbles::from_hex_prefix_encoding(&[0x11, 0x23, 0x45]).unwrap();
        assert!(!leaf);
        assert_eq!(n.len(), 5);

        let (n, leaf) = Nibbles::from_hex_prefix_encoding(&[0x20, 0x0f, 0x1c, 0xb8]).unwrap();
        assert!(leaf);
        assert_eq!(n.len(), 6);
        assert_eq!(n.to_hex_prefix_encoding(true), vec![0x20, 0x0f, 0x1c, 0xb8]);
    }

    #[test]
    fn rejects_bad_flag() {
        assert!(Nibbles::from_hex_prefix_encoding(&[0x40]).is_err());
        assert!(Nibbles::from_hex_prefix_encoding(&[]).is_err());
    }

    #[test]
    fn prefix_splitting() {
        let a = Nibbles::from_bytes_be(&[0x12, 0x34]);
        let b = Nibbles::from_bytes_be(&[0x12, 0x78]);
        assert_eq!(a.common_prefix_len(&b), 2);
        assert_eq!(a.prefix(2), b.prefix(2));

        let mut rest = a.truncate_n_nibbles_front(2);
        assert_eq!(rest.len(), 2);
        assert_eq!(rest.pop_next_nibble_front(), 0x3);
        assert_eq!(rest.pop_next_nibble_front(), 0x4);
        assert!(rest.is_empty());
    }
}
