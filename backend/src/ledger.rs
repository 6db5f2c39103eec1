//! The ledger collaborator and its local sqlite mirror.

use crate::db::{self, Db};
use crate::errors::ApiError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use treasury_zk::calldata::WithdrawalCall;
use treasury_zk::commitment::{Commitment, LedgerCommitment};
use treasury_zk::field::{Base, FieldExt};
use uuid::Uuid;

/// Acknowledgement for a call handed to the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub id: Uuid,
    pub kind: String,
    pub queued_at: DateTime<Utc>,
}

/// What the treasury manager needs from the ledger contract.
pub trait Ledger: Send + Sync {
    /// Every commitment ever emitted, in emission order.
    fn commitment_history(&self) -> impl Future<Output = Result<Vec<Commitment>, ApiError>> + Send;

    /// Current Merkle root stored by the contract.
    fn root(&self) -> impl Future<Output = Result<Base, ApiError>> + Send;

    fn submit_deposit(
        &self,
        commitment: &Commitment,
    ) -> impl Future<Output = Result<TxReceipt, ApiError>> + Send;

    fn submit_withdrawal(
        &self,
        call: &WithdrawalCall,
    ) -> impl Future<Output = Result<TxReceipt, ApiError>> + Send;

    fn is_spent(&self, index: u64) -> impl Future<Output = Result<bool, ApiError>> + Send;
}

/// Ledger view backed by the local mirror.
///
/// Events are fed in through the ingest methods. Submitted calls land in the outbox with status
/// `pending` for whatever relays them to the chain.
#[derive(Clone)]
pub struct SqliteLedger {
    db: Db,
}

impl SqliteLedger {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Records a commitment event. Points are validated before anything is stored.
    pub async fn ingest_leaf(&self, index: u64, raw: &LedgerCommitment) -> Result<Base, ApiError> {
        let commitment = Commitment::from_ledger(raw)?;
        let leaf_hash = commitment.hash()?;
        db::insert_leaf(&self.db, index, raw, &leaf_hash.to_hex()).await?;
        tracing::info!(index, leaf_hash = %leaf_hash.to_hex(), "ingested ledger leaf");
        Ok(leaf_hash)
    }

    /// Records the contract's root as observed after `leaf_count` insertions.
    pub async fn ingest_root(&self, root: &Base) -> Result<u64, ApiError> {
        let leaf_count = db::count_leaves(&self.db).await?;
        db::insert_root(&self.db, &root.to_hex(), leaf_count).await?;
        tracing::info!(leaf_count, root = %root.to_hex(), "ingested ledger root");
        Ok(leaf_count)
    }

    pub async fn ingest_spent(&self, index: u64) -> Result<bool, ApiError> {
        let leaves = db::count_leaves(&self.db).await?;
        if index >= leaves {
            return Err(ApiError::NotFound(format!("leaf {index} has not been observed")));
        }
        let fresh = db::mark_spent(&self.db, index).await?;
        tracing::info!(index, fresh, "ingested spent marker");
        Ok(fresh)
    }

    async fn enqueue(&self, kind: &str, payload: serde_json::Value) -> Result<TxReceipt, ApiError> {
        let id = Uuid::new_v4();
        let queued_at = db::insert_outbox(&self.db, id, kind, &payload).await?;
        tracing::info!(%id, kind, "queued ledger call");
        Ok(TxReceipt { id, kind: kind.to_string(), queued_at })
    }
}

impl Ledger for SqliteLedger {
    async fn commitment_history(&self) -> Result<Vec<Commitment>, ApiError> {
        let leaves = db::all_leaves(&self.db).await?;
        let mut out = Vec::with_capacity(leaves.len());
        for leaf in leaves {
            out.push(Commitment::from_ledger(&leaf.commitment)?);
        }
        Ok(out)
    }

    async fn root(&self) -> Result<Base, ApiError> {
        let Some(stored) = db::latest_root(&self.db).await? else {
            return Err(ApiError::NotFound("no ledger root observed yet".to_string()));
        };
        Ok(Base::from_hex(&stored.root)?)
    }

    async fn submit_deposit(&self, commitment: &Commitment) -> Result<TxReceipt, ApiError> {
        let payload = serde_json::to_value(commitment.to_ledger_args()).map_err(|_| ApiError::Internal)?;
        self.enqueue("deposit", payload).await
    }

    async fn submit_withdrawal(&self, call: &WithdrawalCall) -> Result<TxReceipt, ApiError> {
        let payload = serde_json::to_value(call).map_err(|_| ApiError::Internal)?;
        self.enqueue("withdrawal", payload).await
    }

    async fn is_spent(&self, index: u64) -> Result<bool, ApiError> {
        db::is_spent(&self.db, index).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use treasury_zk::curve::Point;
    use treasury_zk::merkle::MerkleAccumulator;
    use treasury_zk::ZkError;

    fn deposits(n: usize) -> Vec<Commitment> {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        (0..n)
            .map(|i| Commitment::deposit(&mut rng, &Point::generator(), i as u128 + 1).unwrap().0)
            .collect()
    }

    #[tokio::test]
    async fn mirror_replays_history_in_order() {
        let ledger = SqliteLedger::new(test_db().await);
        let history = deposits(3);
        for (i, c) in history.iter().enumerate() {
            let h = ledger.ingest_leaf(i as u64, &c.to_ledger_args()).await.unwrap();
            assert_eq!(h, c.hash().unwrap());
        }
        assert_eq!(ledger.commitment_history().await.unwrap(), history);

        let tree = MerkleAccumulator::from_leaves(8, history.iter().map(|c| c.hash().unwrap())).unwrap();
        assert_eq!(ledger.ingest_root(&tree.root()).await.unwrap(), 3);
        assert_eq!(ledger.root().await.unwrap(), tree.root());
    }

    #[tokio::test]
    async fn off_curve_events_are_rejected() {
        let ledger = SqliteLedger::new(test_db().await);
        let mut raw = deposits(1)[0].to_ledger_args();
        raw.p.y[31] ^= 1;
        let err = ledger.ingest_leaf(0, &raw).await.unwrap_err();
        assert!(matches!(err, ApiError::Zk(ZkError::InvalidPoint)));
        assert!(ledger.commitment_history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn root_is_required() {
        let ledger = SqliteLedger::new(test_db().await);
        assert!(matches!(ledger.root().await, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn spent_markers_need_a_known_leaf() {
        let ledger = SqliteLedger::new(test_db().await);
        assert!(matches!(ledger.ingest_spent(0).await, Err(ApiError::NotFound(_))));
        ledger.ingest_leaf(0, &deposits(1)[0].to_ledger_args()).await.unwrap();
        assert!(ledger.ingest_spent(0).await.unwrap());
        assert!(ledger.is_spent(0).await.unwrap());
        assert!(!ledger.is_spent(1).await.unwrap());
    }

    #[tokio::test]
    async fn submissions_go_to_the_outbox() {
        let db = test_db().await;
        let ledger = SqliteLedger::new(db.clone());
        let c = deposits(1)[0];
        let receipt = ledger.submit_deposit(&c).await.unwrap();
        assert_eq!(receipt.kind, "deposit");

        let pending = db::list_outbox(&db, Some("pending")).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, receipt.id);
        let raw: LedgerCommitment = serde_json::from_value(pending[0].payload.clone()).unwrap();
        assert_eq!(Commitment::from_ledger(&raw).unwrap(), c);
    }
}
