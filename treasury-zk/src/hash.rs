//! circomlib-compatible Poseidon over BN254.
//!
//! Both arities used by the protocol (2 for Merkle nodes, 5 for commitments) must match the
//! Poseidon contracts deployed next to the ledger and the withdrawal circuit, so the
//! `new_circom` parameter sets are used and nothing else.

use crate::error::ZkError;
use crate::field::Base;
use light_poseidon::{Poseidon, PoseidonHasher};

/// Poseidon with `inputs.len()` inputs (1 to 12).
pub fn poseidon(inputs: &[Base]) -> Result<Base, ZkError> {
    let mut hasher =
        Poseidon::<Base>::new_circom(inputs.len()).map_err(|e| ZkError::Hash(e.to_string()))?;
    hasher.hash(inputs).map_err(|e| ZkError::Hash(e.to_string()))
}

/// Merkle node hash `H(left, right)`.
pub fn hash_left_right(left: &Base, right: &Base) -> Result<Base, ZkError> {
    poseidon(&[*left, *right])
}
