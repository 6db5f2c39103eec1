//! Balance scan and the withdrawal flow.
//!
//! Order matters: the full ledger history is hashed into a fresh accumulator, its root is checked
//! against the ledger's before any witness exists, and the proof is verified locally before the
//! call is submitted. Any failure stops the flow and is returned to the caller.

use crate::errors::ApiError;
use crate::ledger::{Ledger, TxReceipt};
use crate::prover::ProvingBackend;
use ark_bn254::Bn254;
use ark_groth16::VerifyingKey;
use serde::Serialize;
use std::sync::Arc;
use treasury_zk::ZkError;
use treasury_zk::calldata::{self, WithdrawalCall};
use treasury_zk::commitment::{Commitment, decimal_u128};
use treasury_zk::field::{FieldExt, Scalar};
use treasury_zk::keys::KeyPair;
use treasury_zk::merkle::{MerkleAccumulator, MerklePath};
use treasury_zk::witness;

#[derive(Clone, Copy, Debug)]
pub struct FlowParams {
    pub depth: usize,
    pub max_withdraw: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OwnedLeaf {
    pub index: u64,
    pub commitment: Commitment,
}

#[derive(Clone, Debug, Serialize)]
pub struct Balance {
    pub leaves: Vec<OwnedLeaf>,
    #[serde(with = "decimal_u128")]
    pub total: u128,
}

pub struct WithdrawRequest {
    pub treasury_priv: Scalar,
    pub amount: u128,
    /// Leaf indices to spend. When absent, owned leaves are taken in index order until they
    /// cover `amount`.
    pub targets: Option<Vec<u64>>,
}

#[derive(Clone, Debug, Serialize)]
pub struct WithdrawOutcome {
    pub receipt: TxReceipt,
    pub call: WithdrawalCall,
    pub spent_indices: Vec<u64>,
    #[serde(with = "decimal_u128")]
    pub change_value: u128,
    pub root: String,
    pub public_signals: Vec<String>,
}

struct Snapshot {
    tree: MerkleAccumulator,
    owned: Vec<OwnedLeaf>,
}

/// Rebuilds the accumulator from the ledger history and collects the unspent leaves owned by
/// `treasury_priv`.
async fn snapshot<L: Ledger>(ledger: &L, depth: usize, treasury_priv: Scalar) -> Result<Snapshot, ApiError> {
    let history = ledger.commitment_history().await?;

    let (tree, owned) = tokio::task::spawn_blocking(move || {
        let mut tree = MerkleAccumulator::new(depth)?;
        let mut owned = Vec::new();
        for (index, commitment) in history.into_iter().enumerate() {
            tree.insert(commitment.hash()?)?;
            if commitment.is_owned_by(&treasury_priv)? {
                owned.push(OwnedLeaf { index: index as u64, commitment });
            }
        }
        Ok::<_, ZkError>((tree, owned))
    })
    .await
    .map_err(|_| ApiError::Internal)??;

    let mut unspent = Vec::with_capacity(owned.len());
    for leaf in owned {
        if !ledger.is_spent(leaf.index).await? {
            unspent.push(leaf);
        }
    }

    Ok(Snapshot { tree, owned: unspent })
}

fn sum_values<'a>(leaves: impl IntoIterator<Item = &'a OwnedLeaf>) -> Result<u128, ZkError> {
    leaves
        .into_iter()
        .try_fold(0u128, |acc, l| acc.checked_add(l.commitment.v()).ok_or(ZkError::ValueOverflow))
}

pub async fn balance<L: Ledger>(ledger: &L, depth: usize, treasury_priv: Scalar) -> Result<Balance, ApiError> {
    let snap = snapshot(ledger, depth, treasury_priv).await?;
    let total = sum_values(&snap.owned)?;
    Ok(Balance { leaves: snap.owned, total })
}

fn select_targets(
    owned: &[OwnedLeaf],
    amount: u128,
    max_withdraw: usize,
    explicit: Option<&[u64]>,
) -> Result<Vec<OwnedLeaf>, ApiError> {
    if let Some(indices) = explicit {
        if indices.is_empty() {
            return Err(ZkError::EmptyRequest.into());
        }
        return indices
            .iter()
            .map(|i| {
                owned.iter().find(|l| l.index == *i).cloned().ok_or_else(|| {
                    ApiError::BadRequest(format!("leaf {i} is not an unspent leaf of this treasury"))
                })
            })
            .collect();
    }

    // Largest leaves first, so a full batch covers as much as it can.
    let mut by_value: Vec<&OwnedLeaf> = owned.iter().collect();
    by_value.sort_by(|a, b| b.commitment.v().cmp(&a.commitment.v()).then(a.index.cmp(&b.index)));

    let mut picked = Vec::new();
    let mut total = 0u128;
    for leaf in by_value {
        if total >= amount || picked.len() == max_withdraw {
            break;
        }
        total = total.saturating_add(leaf.commitment.v());
        picked.push(leaf.clone());
    }
    picked.sort_by_key(|l| l.index);
    Ok(picked)
}

/// Spends `req.amount` from the treasury and sends the change back to it under `change_nonce`.
///
/// The proof is checked against `vk` on the blocking pool before anything is submitted.
pub async fn withdraw<L: Ledger, P: ProvingBackend + 'static>(
    ledger: &L,
    prover: &Arc<P>,
    vk: Arc<VerifyingKey<Bn254>>,
    params: FlowParams,
    req: WithdrawRequest,
    change_nonce: KeyPair,
) -> Result<WithdrawOutcome, ApiError> {
    if req.amount == 0 {
        return Err(ApiError::BadRequest("amount must be positive".to_string()));
    }

    let snap = snapshot(ledger, params.depth, req.treasury_priv).await?;
    let root = snap.tree.root();
    snap.tree.check_root(&ledger.root().await?)?;

    let targets = select_targets(&snap.owned, req.amount, params.max_withdraw, req.targets.as_deref())?;
    let total = sum_values(&targets)?;
    if total < req.amount {
        return Err(ApiError::InsufficientFunds { requested: req.amount, available: total });
    }

    let leaves: Vec<Commitment> = targets.iter().map(|t| t.commitment).collect();
    let indices: Vec<u64> = targets.iter().map(|t| t.index).collect();
    let paths = indices
        .iter()
        .map(|i| snap.tree.path_to(*i))
        .collect::<Result<Vec<MerklePath>, _>>()?;

    let batch = witness::build(&leaves, &paths, &indices, params.max_withdraw)?;
    let witness = batch.witness(&root, &req.treasury_priv);

    tracing::info!(
        targets = batch.real_count(),
        amount = %req.amount,
        total = %total,
        root = %root.to_hex(),
        "proving withdrawal"
    );

    let output = prover.prove(&witness).await?;
    let verified = {
        let prover = Arc::clone(prover);
        let signals = output.public_signals.clone();
        let proof = output.proof.clone();
        tokio::task::spawn_blocking(move || prover.verify(&vk, &signals, &proof))
            .await
            .map_err(|_| ApiError::Internal)??
    };
    if !verified {
        tracing::warn!("withdrawal proof failed local verification, not submitting");
        return Err(ZkError::VerificationFailed.into());
    }

    let change_value = total - req.amount;
    let treasury_pub = KeyPair::from_secret(req.treasury_priv)?.public;
    let change = Commitment::from_keys(&treasury_pub, &change_nonce.secret, &change_nonce.public, change_value)?;

    let proof = calldata::format(&output.proof, &output.public_signals)?;
    let call = WithdrawalCall::new(req.amount, change.p(), change.q(), proof);
    let receipt = ledger.submit_withdrawal(&call).await?;

    tracing::info!(receipt = %receipt.id, change = %change_value, "withdrawal submitted");

    Ok(WithdrawOutcome {
        receipt,
        call,
        spent_indices: indices,
        change_value,
        root: root.to_hex(),
        public_signals: output.public_signals,
    })
}
