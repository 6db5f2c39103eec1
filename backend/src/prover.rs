//! The proving-backend collaborator and its snarkjs implementation.

use crate::config::ProverConfig;
use ark_bn254::Bn254;
use ark_groth16::VerifyingKey;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use treasury_zk::ZkError;
use treasury_zk::calldata::SnarkjsProof;
use treasury_zk::field::{Base, FieldExt};
use treasury_zk::groth16::verify_proof;
use treasury_zk::witness::WithdrawalWitness;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofOutput {
    pub proof: SnarkjsProof,
    pub public_signals: Vec<String>,
}

pub trait ProvingBackend: Send + Sync {
    fn prove(
        &self,
        witness: &WithdrawalWitness,
    ) -> impl Future<Output = Result<ProofOutput, ZkError>> + Send;

    /// `Ok(false)` when the proof does not verify; `Err` when the inputs cannot be decoded.
    ///
    /// Runs the pairing check, so call it off the async executor.
    fn verify(
        &self,
        vk: &VerifyingKey<Bn254>,
        public_signals: &[String],
        proof: &SnarkjsProof,
    ) -> Result<bool, ZkError> {
        let inputs = public_signals
            .iter()
            .map(|s| Base::from_decimal(s))
            .collect::<Result<Vec<_>, _>>()?;
        match verify_proof(vk, &proof.to_ark()?, &inputs) {
            Ok(()) => Ok(true),
            Err(ZkError::VerificationFailed) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Runs `snarkjs groth16 fullprove` against the withdrawal circuit.
pub struct SnarkjsProver {
    config: ProverConfig,
}

impl SnarkjsProver {
    pub fn new(config: ProverConfig) -> Self {
        Self { config }
    }
}

fn backend_err(context: &str, e: impl std::fmt::Display) -> ZkError {
    ZkError::ProvingBackendFailure(format!("{context}: {e}"))
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ZkError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| backend_err(&format!("reading {}", path.display()), e))?;
    serde_json::from_slice(&bytes).map_err(|e| backend_err(&format!("parsing {}", path.display()), e))
}

impl ProvingBackend for SnarkjsProver {
    async fn prove(&self, witness: &WithdrawalWitness) -> Result<ProofOutput, ZkError> {
        for artifact in [&self.config.circuit_wasm, &self.config.circuit_zkey] {
            if !artifact.is_file() {
                return Err(backend_err("missing circuit artifact", artifact.display()));
            }
        }

        let dir = tempfile::Builder::new()
            .prefix("withdraw_fullprove")
            .tempdir()
            .map_err(|e| backend_err("creating scratch dir", e))?;
        let input_path = dir.path().join("input.json");
        let proof_path = dir.path().join("proof.json");
        let public_path = dir.path().join("public.json");

        let input = serde_json::to_vec(witness).map_err(|e| backend_err("encoding witness", e))?;
        tokio::fs::write(&input_path, input)
            .await
            .map_err(|e| backend_err("writing witness", e))?;

        let started = Instant::now();
        let child = Command::new(&self.config.snarkjs_bin)
            .arg("groth16")
            .arg("fullprove")
            .arg(&input_path)
            .arg(&self.config.circuit_wasm)
            .arg(&self.config.circuit_zkey)
            .arg(&proof_path)
            .arg(&public_path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.config.timeout, child)
            .await
            .map_err(|_| backend_err("snarkjs", format!("timed out after {:?}", self.config.timeout)))?
            .map_err(|e| backend_err("spawning snarkjs", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!(code = ?output.status.code(), %stderr, "snarkjs fullprove failed");
            return Err(backend_err(
                "snarkjs fullprove",
                format!("exit code {:?}: {stderr}", output.status.code()),
            ));
        }

        let proof: SnarkjsProof = read_json(&proof_path).await?;
        let public_signals: Vec<String> = read_json(&public_path).await?;

        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            n_public = public_signals.len(),
            "withdrawal proof generated"
        );

        Ok(ProofOutput { proof, public_signals })
    }
}
