//! Service configuration, read once from the environment at startup.

use crate::errors::ApiError;
use std::path::PathBuf;
use std::time::Duration;
use treasury_zk::constants::{DEFAULT_TREE_DEPTH, MAX_TREE_DEPTH, N_MAX_WITHDRAW};

pub const DEV_API_KEY: &str = "dev-secret-key";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub addr: String,
    pub data_dir: PathBuf,
    pub api_key: String,
    pub tree_depth: usize,
    pub max_withdraw: usize,
    pub prover: ProverConfig,
}

/// Paths of the snarkjs binary and the withdrawal circuit artifacts.
#[derive(Clone, Debug)]
pub struct ProverConfig {
    pub snarkjs_bin: PathBuf,
    pub circuit_wasm: PathBuf,
    pub circuit_zkey: PathBuf,
    pub verification_key: PathBuf,
    pub timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Unset keys take their defaults, malformed ones fail.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiError> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let tree_depth = parse_num(&lookup, "TREE_DEPTH", DEFAULT_TREE_DEPTH)?;
        if tree_depth == 0 || tree_depth > MAX_TREE_DEPTH {
            return Err(ApiError::Config(format!(
                "TREE_DEPTH must be between 1 and {MAX_TREE_DEPTH}, got {tree_depth}"
            )));
        }

        let max_withdraw = parse_num(&lookup, "N_MAX_WITHDRAW", N_MAX_WITHDRAW)?;
        if max_withdraw == 0 {
            return Err(ApiError::Config("N_MAX_WITHDRAW must be at least 1".to_string()));
        }

        let timeout_secs = parse_num(&lookup, "PROVER_TIMEOUT_SECS", 300u64)?;
        if timeout_secs == 0 {
            return Err(ApiError::Config("PROVER_TIMEOUT_SECS must be at least 1".to_string()));
        }

        Ok(Self {
            addr: get("BACKEND_ADDR", "127.0.0.1:8080"),
            data_dir: PathBuf::from(get("DATA_DIR", "data")),
            api_key: get("API_KEY", DEV_API_KEY),
            tree_depth,
            max_withdraw,
            prover: ProverConfig {
                snarkjs_bin: PathBuf::from(get("SNARKJS_BIN", "snarkjs")),
                circuit_wasm: PathBuf::from(get("CIRCUIT_WASM", "circuits/withdraw.wasm")),
                circuit_zkey: PathBuf::from(get("CIRCUIT_ZKEY", "circuits/withdraw_final.zkey")),
                verification_key: PathBuf::from(get("VERIFICATION_KEY", "circuits/verification_key.json")),
                timeout: Duration::from_secs(timeout_secs),
            },
        })
    }

    pub fn db_url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.data_dir.join("ledger.sqlite").to_string_lossy())
    }
}

fn parse_num<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ApiError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ApiError::Config(format!("{key} is not a valid number: {raw:?}"))),
    }
}
