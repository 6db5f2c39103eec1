//! Cryptographic core of the private treasury protocol.
//!
//! This crate contains:
//! - Field helpers and Baby Jubjub arithmetic over the BN254 scalar field.
//! - Deposit commitments `(P, Q, v)`, the ownership check and their Poseidon hash.
//! - An incremental Merkle accumulator over commitment hashes.
//! - Witness construction for the withdrawal circuit and calldata formatting for the ledger's verifier.
//! - Groth16 helpers for checking a proof client-side before it is submitted.

pub mod calldata;
pub mod commitment;
pub mod constants;
pub mod curve;
pub mod error;
pub mod field;
pub mod groth16;
pub mod hash;
pub mod keys;
pub mod merkle;
pub mod witness;

pub use error::ZkError;
