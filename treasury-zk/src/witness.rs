//! Turns a variable-size withdrawal request into the fixed-size witness of the circuit.
//!
//! The circuit always takes `max_withdraw` entries. Requests with fewer targets are padded with
//! zero sentinels: `P = Q = (0, 0)`, `v = 0`, index 0 and an all-zero path. A sentinel contributes
//! nothing to the proven total and never repeats a real index.
//!
//! NOTE: the sentinel is not a curve point and its path does not lead to the root. The paired
//! circuit has to skip the ownership and inclusion constraints for `v = 0` entries.

use crate::commitment::Commitment;
use crate::error::ZkError;
use crate::field::{Base, FieldExt, Scalar};
use crate::merkle::MerklePath;
use ark_ff::Zero;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// One slot of the padded batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchEntry {
    pub p: [Base; 2],
    pub q: [Base; 2],
    pub v: u128,
    pub leaf_index: u64,
    pub path: MerklePath,
    pub padding: bool,
}

impl BatchEntry {
    fn real(leaf: &Commitment, path: &MerklePath) -> Self {
        Self {
            p: [leaf.p().x(), leaf.p().y()],
            q: [leaf.q().x(), leaf.q().y()],
            v: leaf.v(),
            leaf_index: path.leaf_index,
            path: path.clone(),
            padding: false,
        }
    }

    fn sentinel(depth: usize) -> Self {
        Self {
            p: [Base::zero(); 2],
            q: [Base::zero(); 2],
            v: 0,
            leaf_index: 0,
            path: MerklePath::zeroed(depth),
            padding: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WithdrawalBatch {
    entries: Vec<BatchEntry>,
    real: usize,
    depth: usize,
}

/// Validates a request and pads it to exactly `max_withdraw` entries.
///
/// Checks run in this order: equal lengths, non-empty, at most `max_withdraw`, distinct indices,
/// each path belonging to its index, and equal path depths.
pub fn build(
    leaves: &[Commitment],
    paths: &[MerklePath],
    indices: &[u64],
    max_withdraw: usize,
) -> Result<WithdrawalBatch, ZkError> {
    if leaves.len() != paths.len() || paths.len() != indices.len() {
        return Err(ZkError::BatchShapeMismatch {
            leaves: leaves.len(),
            paths: paths.len(),
            indices: indices.len(),
        });
    }
    if leaves.is_empty() {
        return Err(ZkError::EmptyRequest);
    }
    if leaves.len() > max_withdraw {
        return Err(ZkError::TooManyTargets { got: leaves.len(), max: max_withdraw });
    }

    let mut seen = HashSet::with_capacity(indices.len());
    for index in indices {
        if !seen.insert(*index) {
            return Err(ZkError::DuplicateTarget(*index));
        }
    }

    let depth = paths[0].depth();
    for (path, index) in paths.iter().zip(indices) {
        if path.leaf_index != *index {
            return Err(ZkError::PathIndexMismatch { index: *index, path_index: path.leaf_index });
        }
        if path.depth() != depth || path.directions.len() != depth {
            return Err(ZkError::PathDepthMismatch { expected: depth, got: path.depth() });
        }
    }

    let mut entries: Vec<BatchEntry> =
        leaves.iter().zip(paths).map(|(leaf, path)| BatchEntry::real(leaf, path)).collect();
    entries.resize_with(max_withdraw, || BatchEntry::sentinel(depth));

    Ok(WithdrawalBatch { entries, real: leaves.len(), depth })
}

impl WithdrawalBatch {
    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    /// Number of entries that are not padding.
    pub fn real_count(&self) -> usize {
        self.real
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Sum of `v` over the whole padded batch.
    pub fn total_value(&self) -> Result<u128, ZkError> {
        self.entries
            .iter()
            .try_fold(0u128, |acc, e| acc.checked_add(e.v).ok_or(ZkError::ValueOverflow))
    }

    pub fn witness(&self, root: &Base, treasury_priv: &Scalar) -> WithdrawalWitness {
        let decimal_pair = |pair: &[Base; 2]| [pair[0].to_decimal(), pair[1].to_decimal()];

        WithdrawalWitness {
            v: self.entries.iter().map(|e| e.v.to_string()).collect(),
            root: root.to_decimal(),
            leaf_index: self.entries.iter().map(|e| e.leaf_index.to_string()).collect(),
            p: self.entries.iter().map(|e| decimal_pair(&e.p)).collect(),
            q: self.entries.iter().map(|e| decimal_pair(&e.q)).collect(),
            treasury_priv: treasury_priv.to_decimal(),
            path_index: self
                .entries
                .iter()
                .map(|e| e.path.directions.iter().map(|d| u8::from(*d).to_string()).collect())
                .collect(),
            path_elements: self
                .entries
                .iter()
                .map(|e| e.path.siblings.iter().map(|s| s.to_decimal()).collect())
                .collect(),
        }
    }
}

/// Input file of the withdrawal circuit. Every value is a decimal string.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalWitness {
    pub v: Vec<String>,
    pub root: String,
    #[serde(rename = "leafIndex")]
    pub leaf_index: Vec<String>,
    #[serde(rename = "P")]
    pub p: Vec<[String; 2]>,
    #[serde(rename = "Q")]
    pub q: Vec<[String; 2]>,
    #[serde(rename = "treasuryPriv")]
    pub treasury_priv: String,
    #[serde(rename = "pathIndex")]
    pub path_index: Vec<Vec<String>>,
    #[serde(rename = "pathElements")]
    pub path_elements: Vec<Vec<String>>,
}

impl fmt::Debug for WithdrawalWitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WithdrawalWitness")
            .field("v", &self.v)
            .field("root", &self.root)
            .field("leaf_index", &self.leaf_index)
            .finish_non_exhaustive()
    }
}
