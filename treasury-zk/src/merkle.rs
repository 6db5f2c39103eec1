//! Append-only Poseidon Merkle accumulator over commitment hashes.
//!
//! Mirrors the ledger's incremental tree: leaves are appended in emission order, empty slots hold
//! [`NOTHING_UP_MY_SLEEVE`] and every empty subtree of height `i` hashes to `zeros[i]`. Two trees
//! that observed the same insertions therefore agree on their root, which is what lets the
//! withdrawal flow compare its local root with the one stored on the ledger.

use crate::constants::{MAX_TREE_DEPTH, NOTHING_UP_MY_SLEEVE};
use crate::error::ZkError;
use crate::field::{Base, FieldExt};
use crate::hash::hash_left_right;

#[derive(Clone, Debug)]
pub struct MerkleAccumulator {
    depth: usize,
    /// `zeros[i]` is the root of an empty subtree of height `i`; `zeros[depth]` is the empty root.
    zeros: Vec<Base>,
    /// `levels[0]` holds the leaves, `levels[i]` the filled nodes at height `i`.
    levels: Vec<Vec<Base>>,
}

/// Siblings from the leaf up to the root.
///
/// `directions[i]` is `false` when the running node is the left child at height `i` and `true`
/// when it is the right child, i.e. bit `i` of the leaf index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerklePath {
    pub leaf_index: u64,
    pub siblings: Vec<Base>,
    pub directions: Vec<bool>,
}

impl MerklePath {
    pub fn depth(&self) -> usize {
        self.siblings.len()
    }

    /// Folds `leaf` with the siblings to the root it commits to.
    pub fn compute_root(&self, leaf: &Base) -> Result<Base, ZkError> {
        if self.siblings.len() != self.directions.len() {
            return Err(ZkError::PathDepthMismatch {
                expected: self.siblings.len(),
                got: self.directions.len(),
            });
        }
        let mut node = *leaf;
        for (sibling, is_right) in self.siblings.iter().zip(&self.directions) {
            node = if *is_right {
                hash_left_right(sibling, &node)?
            } else {
                hash_left_right(&node, sibling)?
            };
        }
        Ok(node)
    }

    pub fn verify(&self, leaf: &Base, root: &Base) -> Result<bool, ZkError> {
        Ok(self.compute_root(leaf)? == *root)
    }

    /// Zero siblings at index 0, the inclusion path of a padding entry.
    pub fn zeroed(depth: usize) -> Self {
        Self { leaf_index: 0, siblings: vec![Base::from(0u64); depth], directions: vec![false; depth] }
    }
}

impl MerkleAccumulator {
    pub fn new(depth: usize) -> Result<Self, ZkError> {
        if depth == 0 || depth > MAX_TREE_DEPTH {
            return Err(ZkError::InvalidTreeDepth { depth, max: MAX_TREE_DEPTH });
        }

        let mut zeros = Vec::with_capacity(depth + 1);
        zeros.push(NOTHING_UP_MY_SLEEVE);
        for i in 0..depth {
            zeros.push(hash_left_right(&zeros[i], &zeros[i])?);
        }

        Ok(Self { depth, zeros, levels: vec![Vec::new(); depth + 1] })
    }

    /// Builds a tree by inserting `leaves` in order.
    pub fn from_leaves<I>(depth: usize, leaves: I) -> Result<Self, ZkError>
    where
        I: IntoIterator<Item = Base>,
    {
        let mut tree = Self::new(depth)?;
        for leaf in leaves {
            tree.insert(leaf)?;
        }
        Ok(tree)
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn len(&self) -> u64 {
        self.levels[0].len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.levels[0].is_empty()
    }

    pub fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    pub fn zeros(&self) -> &[Base] {
        &self.zeros
    }

    pub fn leaf(&self, index: u64) -> Option<Base> {
        self.levels[0].get(usize::try_from(index).ok()?).copied()
    }

    pub fn leaves(&self) -> &[Base] {
        &self.levels[0]
    }

    /// Appends `leaf` at the next free position and returns that position.
    ///
    /// On error (full tree or a hashing failure) the tree is left untouched.
    pub fn insert(&mut self, leaf: Base) -> Result<u64, ZkError> {
        let index = self.len();
        if index >= self.capacity() {
            return Err(ZkError::TreeFull { capacity: self.capacity() });
        }

        let mut updates = Vec::with_capacity(self.depth);
        let mut node = leaf;
        let mut pos = self.levels[0].len();
        for level in 0..self.depth {
            node = if pos % 2 == 0 {
                let right = self.levels[level].get(pos + 1).copied().unwrap_or(self.zeros[level]);
                hash_left_right(&node, &right)?
            } else {
                hash_left_right(&self.levels[level][pos - 1], &node)?
            };
            pos /= 2;
            updates.push((pos, node));
        }

        self.levels[0].push(leaf);
        for (level, (pos, node)) in updates.into_iter().enumerate() {
            let nodes = &mut self.levels[level + 1];
            if pos < nodes.len() {
                nodes[pos] = node;
            } else {
                nodes.push(node);
            }
        }
        Ok(index)
    }

    pub fn root(&self) -> Base {
        self.levels[self.depth].first().copied().unwrap_or(self.zeros[self.depth])
    }

    pub fn path_to(&self, index: u64) -> Result<MerklePath, ZkError> {
        if index >= self.len() {
            return Err(ZkError::IndexOutOfRange { index, len: self.len() });
        }

        let mut siblings = Vec::with_capacity(self.depth);
        let mut directions = Vec::with_capacity(self.depth);
        // index < len <= 2^32, so the cast is lossless.
        let mut pos = index as usize;
        for level in 0..self.depth {
            let sibling = self.levels[level].get(pos ^ 1).copied().unwrap_or(self.zeros[level]);
            siblings.push(sibling);
            directions.push(pos % 2 == 1);
            pos /= 2;
        }
        Ok(MerklePath { leaf_index: index, siblings, directions })
    }

    /// Compares the local root with one observed on the ledger.
    pub fn check_root(&self, expected: &Base) -> Result<(), ZkError> {
        let actual = self.root();
        if actual != *expected {
            return Err(ZkError::RootMismatch {
                expected: expected.to_decimal(),
                actual: actual.to_decimal(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn leaves(n: u64) -> Vec<Base> {
        (0..n).map(|i| Base::from(1000 + i)).collect()
    }

    /// Root recomputed from scratch, level by level.
    fn naive_root(depth: usize, leaves: &[Base]) -> Base {
        let mut level: Vec<Base> = (0..1usize << depth)
            .map(|i| leaves.get(i).copied().unwrap_or(NOTHING_UP_MY_SLEEVE))
            .collect();
        while level.len() > 1 {
            level = level.chunks(2).map(|c| hash_left_right(&c[0], &c[1]).unwrap()).collect();
        }
        level[0]
    }

    #[test]
    fn depth_is_bounded() {
        assert_eq!(MerkleAccumulator::new(0).unwrap_err(), ZkError::InvalidTreeDepth { depth: 0, max: 32 });
        assert!(MerkleAccumulator::new(33).is_err());
        assert_eq!(MerkleAccumulator::new(32).unwrap().capacity(), 1 << 32);
    }

    #[test]
    fn empty_root_is_the_zero_chain() {
        let tree = MerkleAccumulator::new(3).unwrap();
        let z = tree.zeros();
        assert_eq!(z[0], NOTHING_UP_MY_SLEEVE);
        assert_eq!(z[1], hash_left_right(&z[0], &z[0]).unwrap());
        assert_eq!(tree.root(), z[3]);
        assert_eq!(tree.root(), naive_root(3, &[]));
        assert!(tree.is_empty());
    }

    #[test]
    fn incremental_root_matches_full_recomputation() {
        let all = leaves(8);
        let mut tree = MerkleAccumulator::new(3).unwrap();
        for (i, leaf) in all.iter().enumerate() {
            assert_eq!(tree.insert(*leaf).unwrap(), i as u64);
            assert_eq!(tree.root(), naive_root(3, &all[..=i]));
        }
    }

    #[test]
    fn every_path_replays_to_the_root() {
        let tree = MerkleAccumulator::from_leaves(4, leaves(11)).unwrap();
        for i in 0..tree.len() {
            let path = tree.path_to(i).unwrap();
            assert_eq!(path.depth(), 4);
            assert_eq!(path.leaf_index, i);
            let leaf = tree.leaf(i).unwrap();
            assert_eq!(path.compute_root(&leaf).unwrap(), tree.root());
            assert!(path.verify(&leaf, &tree.root()).unwrap());
            assert!(!path.verify(&(leaf + Base::from(1u64)), &tree.root()).unwrap());
        }
    }

    #[test]
    fn path_directions_are_index_bits() {
        let tree = MerkleAccumulator::from_leaves(3, leaves(6)).unwrap();
        let path = tree.path_to(5).unwrap();
        assert_eq!(path.directions, vec![true, false, true]);
        assert_eq!(path.siblings[0], tree.leaf(4).unwrap());
        // Nothing sits to the right of leaves 4 and 5 at height 1.
        assert_eq!(path.siblings[1], tree.zeros()[1]);
    }

    #[test]
    fn out_of_range_paths_are_rejected() {
        let tree = MerkleAccumulator::from_leaves(4, leaves(3)).unwrap();
        assert_eq!(tree.path_to(3), Err(ZkError::IndexOutOfRange { index: 3, len: 3 }));
        assert!(MerkleAccumulator::new(4).unwrap().path_to(0).is_err());
    }

    #[test]
    fn full_tree_rejects_inserts_without_changing() {
        let mut tree = MerkleAccumulator::from_leaves(2, leaves(4)).unwrap();
        let root = tree.root();
        assert_eq!(tree.insert(Base::from(1u64)), Err(ZkError::TreeFull { capacity: 4 }));
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.root(), root);
    }

    #[test]
    fn insertion_order_changes_the_root() {
        let mut reversed = leaves(4);
        reversed.reverse();
        let a = MerkleAccumulator::from_leaves(3, leaves(4)).unwrap();
        let b = MerkleAccumulator::from_leaves(3, reversed).unwrap();
        assert_ne!(a.root(), b.root());
    }

    #[test]
    fn root_check_reports_both_roots() {
        let tree = MerkleAccumulator::from_leaves(3, leaves(2)).unwrap();
        assert!(tree.check_root(&tree.root()).is_ok());

        let stale = MerkleAccumulator::from_leaves(3, leaves(1)).unwrap().root();
        assert_eq!(
            tree.check_root(&stale),
            Err(ZkError::RootMismatch { expected: stale.to_decimal(), actual: tree.root().to_decimal() })
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn independently_built_trees_agree(values in proptest::collection::vec(any::<u64>(), 0..12)) {
            let leaves: Vec<Base> = values.iter().map(|v| Base::from(*v)).collect();
            let a = MerkleAccumulator::from_leaves(4, leaves.clone()).unwrap();
            let b = MerkleAccumulator::from_leaves(4, leaves.clone()).unwrap();
            prop_assert_eq!(a.root(), b.root());
            prop_assert_eq!(a.root(), naive_root(4, &leaves));
        }
    }
}
