//! Error taxonomy shared by every core operation.

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ZkError {
    #[error("value is not an element of the {field} field")]
    FieldMismatch { field: &'static str },

    #[error("element has no multiplicative inverse")]
    NotInvertible,

    #[error("division by zero in curve arithmetic")]
    DivisionByZero,

    #[error("no square root exists for the requested coordinate")]
    NoSquareRoot,

    #[error("point is not on the curve")]
    InvalidPoint,

    #[error("invalid tree depth {depth}: must be between 1 and {max}")]
    InvalidTreeDepth { depth: usize, max: usize },

    #[error("merkle tree is full (capacity {capacity})")]
    TreeFull { capacity: u64 },

    #[error("leaf index {index} out of range: tree holds {len} leaves")]
    IndexOutOfRange { index: u64, len: u64 },

    #[error("root mismatch: ledger root {expected}, local root {actual}")]
    RootMismatch { expected: String, actual: String },

    #[error("too many withdrawal targets: {got} exceeds the maximum of {max}")]
    TooManyTargets { got: usize, max: usize },

    #[error("withdrawal request has no targets")]
    EmptyRequest,

    #[error("batch shape mismatch: {leaves} leaves, {paths} paths, {indices} indices")]
    BatchShapeMismatch { leaves: usize, paths: usize, indices: usize },

    #[error("leaf index {0} appears more than once in the batch")]
    DuplicateTarget(u64),

    #[error("inclusion path for leaf {path_index} supplied for target index {index}")]
    PathIndexMismatch { index: u64, path_index: u64 },

    #[error("inclusion path has depth {got}, expected {expected}")]
    PathDepthMismatch { expected: usize, got: usize },

    #[error("batch value overflows 128 bits")]
    ValueOverflow,

    #[error("proving backend failure: {0}")]
    ProvingBackendFailure(String),

    #[error("proof verification failed")]
    VerificationFailed,

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("poseidon error: {0}")]
    Hash(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("arkworks error: {0}")]
    Ark(String),
}
