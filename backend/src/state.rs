use crate::config::AppConfig;
use crate::db::Db;
use crate::errors::ApiError;
use crate::ledger::SqliteLedger;
use crate::prover::SnarkjsProver;
use ark_bn254::Bn254;
use ark_groth16::VerifyingKey;
use std::sync::Arc;
use tokio::sync::OnceCell;
use treasury_zk::groth16::SnarkjsVerifyingKey;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub config: Arc<AppConfig>,
    pub ledger: SqliteLedger,
    pub prover: Arc<SnarkjsProver>,
    vk: Arc<OnceCell<ZkKeys>>,
}

/// The withdrawal circuit's verifying key, in both forms.
#[derive(Clone)]
pub struct ZkKeys {
    pub json: Arc<SnarkjsVerifyingKey>,
    pub vk: Arc<VerifyingKey<Bn254>>,
}

impl AppState {
    pub fn new(db: Db, config: AppConfig) -> Self {
        Self {
            ledger: SqliteLedger::new(db.clone()),
            prover: Arc::new(SnarkjsProver::new(config.prover.clone())),
            db,
            config: Arc::new(config),
            vk: Arc::new(OnceCell::new()),
        }
    }

    /// Loads the snarkjs verification key on first use.
    ///
    /// Every point is decoded and checked, so a corrupt key file fails here and not in the middle
    /// of a withdrawal.
    pub async fn ensure_keys(&self) -> Result<ZkKeys, ApiError> {
        let path = self.config.prover.verification_key.clone();

        self.vk
            .get_or_try_init(|| async move {
                let raw = tokio::fs::read(&path).await.map_err(|e| {
                    tracing::error!(path = %path.display(), error = %e, "cannot read verification key");
                    ApiError::Internal
                })?;

                tokio::task::spawn_blocking(move || {
                    let json: SnarkjsVerifyingKey = serde_json::from_slice(&raw).map_err(|e| {
                        tracing::error!(error = %e, "verification key is not valid snarkjs JSON");
                        ApiError::Internal
                    })?;
                    let vk = json.to_ark()?;
                    tracing::info!(n_public = json.n_public, "loaded verification key");
                    Ok::<ZkKeys, ApiError>(ZkKeys { json: Arc::new(json), vk: Arc::new(vk) })
                })
                .await
                .map_err(|_| ApiError::Internal)?
            })
            .await
            .cloned()
    }
}
