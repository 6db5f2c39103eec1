//! Protocol-wide constants used by the core and the manager service.
//!
//! Curve parameters follow the circomlib / ZoKrates form of Baby Jubjub, so points produced
//! here are the same points the withdrawal circuit and the ledger contract operate on.

use crate::field::Base;
use ark_ff::MontFp;

/// Twisted Edwards coefficient `a`.
pub const CURVE_A: Base = MontFp!("168700");

/// Twisted Edwards coefficient `d`.
pub const CURVE_D: Base = MontFp!("168696");

/// Base point `G` used for every key derivation. It generates the subgroup of prime order `L`.
pub const GENERATOR_X: Base =
    MontFp!("16540640123574156134436876038791482806971768689494387082833631921987005038935");
pub const GENERATOR_Y: Base =
    MontFp!("20819045374670962167435360035096875258406992893633759881276124905556507972311");

/// Tree depth used by the deployed contract and circuit.
pub const DEFAULT_TREE_DEPTH: usize = 32;

/// Largest supported depth. Leaf positions must fit in a `u64`, and the contract uses 32.
pub const MAX_TREE_DEPTH: usize = 32;

/// Number of leaves a single withdrawal proof covers. Smaller requests are padded up to it.
pub const N_MAX_WITHDRAW: usize = 5;

/// Empty-leaf value: keccak256("Maci") mod p.
///
/// Using the same constant as the contract is what makes independently built trees over the
/// same deposit history agree on their root.
pub const NOTHING_UP_MY_SLEEVE: Base =
    MontFp!("8370432830353022751713833565135785980866757267633941821328460903436894336785");

/// Upper bound on `x + 1` retries when embedding a field element as a curve point.
pub const MAX_FIELD_TO_POINT_ATTEMPTS: u64 = 256;
