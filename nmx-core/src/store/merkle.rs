// src/store/merkle.rs

//! Binary Merkle trees and inclusion proofs.
//!
//! Leaves are paired left to right; a node without a partner is promoted
//! to the next level unchanged. The app hash is a second tree of the same
//! shape over `(store name, store root)` leaves.

use crate::store::full_key;
use nmx_crypto::hash::{merkle_inner, merkle_leaf, Hash};
use serde::{Deserialize, Serialize};

/// Root of a tree with no leaves
pub const EMPTY_ROOT: Hash = [0u8; 32];

/// Computes the root over leaf hashes
pub fn root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return EMPTY_ROOT;
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => merkle_inner(left, right),
                [single] => *single,
                _ => EMPTY_ROOT,
            })
            .collect();
    }
    level[0]
}

/// One level of an inclusion path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    /// Sibling hash at this level
    pub sibling: Hash,
    /// Whether the sibling sits to the left
    pub sibling_left: bool,
}

/// Inclusion path from a leaf to a root
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Steps from the leaf upward; promoted levels have no step
    pub steps: Vec<ProofStep>,
}

impl MerkleProof {
    /// Builds the path for `index`; `None` if out of range
    pub fn build(leaves: &[Hash], index: usize) -> Option<Self> {
        if index >= leaves.len() {
            return None;
        }
        let mut steps = Vec::new();
        let mut level = leaves.to_vec();
        let mut idx = index;
        while level.len() > 1 {
            let partner = idx ^ 1;
            if partner < level.len() {
                steps.push(ProofStep {
                    sibling: level[partner],
                    sibling_left: partner < idx,
                });
            }
            level = level
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => merkle_inner(left, right),
                    [single] => *single,
                    _ => EMPTY_ROOT,
                })
                .collect();
            idx /= 2;
        }
        Some(Self { steps })
    }

    /// Root reached by folding the path over `leaf`
    pub fn compute_root(&self, leaf: Hash) -> Hash {
        self.steps.iter().fold(leaf, |acc, step| {
            if step.sibling_left {
                merkle_inner(&step.sibling, &acc)
            } else {
                merkle_inner(&acc, &step.sibling)
            }
        })
    }
}

/// Two-level proof that `key = value` is in store `store` under an app hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreProof {
    /// Store name
    pub store: String,
    /// Key inside the store
    pub key: Vec<u8>,
    /// Committed value
    pub value: Vec<u8>,
    /// Path from the key/value leaf to the store root
    pub store_path: MerkleProof,
    /// Path from the `(store, root)` leaf to the app hash
    pub app_path: MerkleProof,
}

impl StoreProof {
    /// Store root implied by the proof
    pub fn store_root(&self) -> Hash {
        self.store_path.compute_root(merkle_leaf(&self.key, &self.value))
    }

    /// Verifies the proof against an app hash
    pub fn verify(&self, app_hash: &Hash) -> bool {
        let store_root = self.store_root();
        let app_leaf = merkle_leaf(self.store.as_bytes(), &store_root);
        self.app_path.compute_root(app_leaf) == *app_hash
    }

    /// Full store key the proof covers
    pub fn full_key(&self) -> Vec<u8> {
        full_key(&self.store, &self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nmx_crypto::hash::blake3_hash;

    fn create_test_leaves(n: usize) -> Vec<Hash> {
        (0..n).map(|i| blake3_hash(&[i as u8])).collect()
    }

    #[test]
    fn test_empty_and_single() {
        assert_eq!(root(&[]), EMPTY_ROOT);
        let leaves = create_test_leaves(1);
        assert_eq!(root(&leaves), leaves[0]);
    }

    #[test]
    fn test_odd_node_promoted() {
        let l = create_test_leaves(3);
        let expected = merkle_inner(&merkle_inner(&l[0], &l[1]), &l[2]);
        assert_eq!(root(&l), expected);
    }

    #[test]
    fn test_every_proof_verifies() {
        for n in 1..=9 {
            let leaves = create_test_leaves(n);
            let r = root(&leaves);
            for i in 0..n {
                let proof = MerkleProof::build(&leaves, i).unwrap();
                assert_eq!(proof.compute_root(leaves[i]), r, "n={} i={}", n, i);
            }
        }
    }

    #[test]
    fn test_proof_out_of_range() {
        assert!(MerkleProof::build(&create_test_leaves(2), 2).is_none());
    }

    #[test]
    fn test_wrong_leaf_fails() {
        let leaves = create_test_leaves(4);
        let proof = MerkleProof::build(&leaves, 1).unwrap();
        assert_ne!(proof.compute_root(leaves[2]), root(&leaves));
    }
}
