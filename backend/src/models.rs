use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use treasury_zk::calldata::{ProofCalldata, SnarkjsProof};
use treasury_zk::commitment::{Commitment, LedgerCommitment, decimal_u128};
use treasury_zk::curve::Point;
use treasury_zk::groth16::SnarkjsVerifyingKey;
use uuid::Uuid;

use crate::ledger::TxReceipt;

#[derive(Debug, Serialize, Deserialize)]
pub struct KeyPairResponse {
    /// Decimal scalar. Shown once; the service keeps no copy.
    pub secret: String,
    pub public: Point,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DepositRequest {
    pub treasury_public: Point,
    #[serde(with = "decimal_u128")]
    pub value: u128,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DepositResponse {
    pub commitment: Commitment,
    /// The `(P, Q, v)` arguments as the ledger contract takes them.
    pub ledger_args: LedgerCommitment,
    pub leaf_hash: String,
    pub receipt: TxReceipt,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestLeafRequest {
    pub index: u64,
    pub commitment: LedgerCommitment,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestLeafResponse {
    pub index: u64,
    pub leaf_hash: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestRootRequest {
    /// `0x`-prefixed 32-byte hex.
    pub root: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestRootResponse {
    pub root: String,
    pub leaf_count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestSpentRequest {
    pub index: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestSpentResponse {
    pub index: u64,
    /// `false` when the leaf was already marked.
    pub fresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListLeavesParams {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeafListResponse {
    pub offset: u64,
    pub limit: u64,
    pub leaves_total: u64,
    pub leaves: Vec<LeafListItem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeafListItem {
    pub index: u64,
    pub commitment: LedgerCommitment,
    pub leaf_hash: String,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TreeResponse {
    pub depth: usize,
    pub leaf_count: u64,
    pub root: String,
    /// Latest root reported by the ledger, if any.
    pub ledger_root: Option<String>,
    /// Leaves the mirror held when that root was observed.
    pub ledger_leaf_count: Option<u64>,
    pub ledger_root_observed_at: Option<DateTime<Utc>>,
    pub in_sync: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PathResponse {
    pub leaf_index: u64,
    pub leaf_hash: String,
    pub root: String,
    pub siblings: Vec<String>,
    /// Bit `i` is set when the node at level `i` is a right child.
    pub directions: Vec<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceRequest {
    /// Decimal treasury scalar.
    pub treasury_priv: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub treasury_priv: String,
    #[serde(with = "decimal_u128")]
    pub amount: u128,
    pub targets: Option<Vec<u64>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CalldataRequest {
    pub proof: SnarkjsProof,
    pub public_signals: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CalldataResponse {
    pub calldata: ProofCalldata,
    /// Same text as `snarkjs zkey export soliditycalldata`.
    pub solidity: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ZkVkResponse {
    pub curve: String,
    pub proof_system: String,
    pub n_public: usize,
    /// Compressed arkworks encoding.
    pub vk_b64: String,
    pub vk_json: SnarkjsVerifyingKey,
}

#[derive(Debug, Deserialize)]
pub struct OutboxParams {
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutboxItem {
    pub id: Uuid,
    pub kind: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}
