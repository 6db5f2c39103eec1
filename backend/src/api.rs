use crate::db;
use crate::errors::ApiError;
use crate::models::*;
use crate::state::AppState;
use crate::withdraw::{self, Balance, FlowParams, WithdrawOutcome, WithdrawRequest};
use axum::{
    extract::{Path, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use rand::rngs::OsRng;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use treasury_zk::calldata;
use treasury_zk::commitment::Commitment;
use treasury_zk::field::{Base, FieldExt, Scalar};
use treasury_zk::groth16::serialize_vk;
use treasury_zk::keys::KeyPair;
use treasury_zk::merkle::MerkleAccumulator;

use crate::ledger::Ledger;

pub fn router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/api/v1/keys", post(create_keys))
        .route("/api/v1/deposits", post(create_deposit))
        .route("/api/v1/ledger/leaves", post(ingest_leaf))
        .route("/api/v1/ledger/roots", post(ingest_root))
        .route("/api/v1/ledger/spent", post(ingest_spent))
        .route("/api/v1/balance", post(get_balance))
        .route("/api/v1/withdrawals", post(create_withdrawal))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/v1/ledger/leaves", get(list_leaves))
        .route("/api/v1/tree", get(get_tree))
        .route("/api/v1/tree/paths/:index", get(get_path))
        .route("/api/v1/calldata", post(format_calldata))
        .route("/api/v1/zk/vk", get(get_vk))
        .route("/api/v1/outbox", get(list_outbox))
        .merge(protected_routes)
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if let Some(provided_key) = headers.get("X-API-KEY") {
        if provided_key == state.config.api_key.as_str() {
            return Ok(next.run(request).await);
        }
    }

    tracing::warn!(path = %request.uri().path(), "unauthorized access attempt");
    Err(StatusCode::UNAUTHORIZED)
}

fn parse_secret(raw: &str) -> Result<Scalar, ApiError> {
    let secret = Scalar::from_decimal(raw.trim())
        .map_err(|_| ApiError::BadRequest("treasury_priv must be a decimal scalar below the subgroup order".to_string()))?;
    if secret == Scalar::from(0u64) {
        return Err(ApiError::BadRequest("treasury_priv must be non-zero".to_string()));
    }
    Ok(secret)
}

fn flow_params(state: &AppState) -> FlowParams {
    FlowParams { depth: state.config.tree_depth, max_withdraw: state.config.max_withdraw }
}

/// Rebuilds the accumulator from the leaf hashes stored in the mirror.
async fn mirror_tree(state: &AppState) -> Result<MerkleAccumulator, ApiError> {
    let leaves = db::all_leaves(&state.db).await?;
    let hashes = leaves
        .iter()
        .map(|l| Base::from_hex(&l.leaf_hash))
        .collect::<Result<Vec<_>, _>>()?;
    let depth = state.config.tree_depth;

    tokio::task::spawn_blocking(move || MerkleAccumulator::from_leaves(depth, hashes))
        .await
        .map_err(|_| ApiError::Internal)?
        .map_err(ApiError::from)
}

async fn create_keys() -> Result<Json<KeyPairResponse>, ApiError> {
    let keys = KeyPair::generate(&mut OsRng)?;
    tracing::info!(public_x = %keys.public.x().to_hex(), "generated treasury key pair");
    Ok(Json(KeyPairResponse { secret: keys.secret_decimal(), public: keys.public }))
}

async fn create_deposit(
    State(state): State<AppState>,
    Json(req): Json<DepositRequest>,
) -> Result<Json<DepositResponse>, ApiError> {
    // The contributor nonce is used once and dropped here.
    let (commitment, _nonce) = Commitment::deposit(&mut OsRng, &req.treasury_public, req.value)?;
    let leaf_hash = commitment.hash()?;
    let receipt = state.ledger.submit_deposit(&commitment).await?;

    Ok(Json(DepositResponse {
        commitment,
        ledger_args: commitment.to_ledger_args(),
        leaf_hash: leaf_hash.to_hex(),
        receipt,
    }))
}

async fn ingest_leaf(
    State(state): State<AppState>,
    Json(req): Json<IngestLeafRequest>,
) -> Result<Json<IngestLeafResponse>, ApiError> {
    let leaf_hash = state.ledger.ingest_leaf(req.index, &req.commitment).await?;
    Ok(Json(IngestLeafResponse { index: req.index, leaf_hash: leaf_hash.to_hex() }))
}

async fn ingest_root(
    State(state): State<AppState>,
    Json(req): Json<IngestRootRequest>,
) -> Result<Json<IngestRootResponse>, ApiError> {
    let root = Base::from_hex(&req.root)?;
    let leaf_count = state.ledger.ingest_root(&root).await?;
    Ok(Json(IngestRootResponse { root: root.to_hex(), leaf_count }))
}

async fn ingest_spent(
    State(state): State<AppState>,
    Json(req): Json<IngestSpentRequest>,
) -> Result<Json<IngestSpentResponse>, ApiError> {
    let fresh = state.ledger.ingest_spent(req.index).await?;
    Ok(Json(IngestSpentResponse { index: req.index, fresh }))
}

async fn list_leaves(
    State(state): State<AppState>,
    Query(params): Query<ListLeavesParams>,
) -> Result<Json<LeafListResponse>, ApiError> {
    let offset = params.offset.unwrap_or(0);
    let limit = params.limit.unwrap_or(50).min(500);

    let leaves_total = db::count_leaves(&state.db).await?;
    let rows = db::list_leaves(&state.db, offset, limit).await?;

    let leaves = rows
        .into_iter()
        .map(|l| LeafListItem {
            index: l.index,
            commitment: l.commitment,
            leaf_hash: l.leaf_hash,
            observed_at: l.observed_at,
        })
        .collect();

    Ok(Json(LeafListResponse { offset, limit, leaves_total, leaves }))
}

async fn get_tree(State(state): State<AppState>) -> Result<Json<TreeResponse>, ApiError> {
    let tree = mirror_tree(&state).await?;
    let root = tree.root().to_hex();
    let latest = db::latest_root(&state.db).await?;
    let in_sync = latest.as_ref().is_some_and(|r| r.root == root);

    Ok(Json(TreeResponse {
        depth: tree.depth(),
        leaf_count: tree.len(),
        root,
        ledger_leaf_count: latest.as_ref().map(|r| r.leaf_count),
        ledger_root_observed_at: latest.as_ref().map(|r| r.observed_at),
        ledger_root: latest.map(|r| r.root),
        in_sync,
    }))
}

async fn get_path(State(state): State<AppState>, Path(index): Path<u64>) -> Result<Json<PathResponse>, ApiError> {
    let tree = mirror_tree(&state).await?;
    let path = tree.path_to(index)?;
    let leaf = tree
        .leaf(index)
        .ok_or_else(|| ApiError::NotFound(format!("leaf {index} has not been observed")))?;

    Ok(Json(PathResponse {
        leaf_index: index,
        leaf_hash: leaf.to_hex(),
        root: tree.root().to_hex(),
        siblings: path.siblings.iter().map(|s| s.to_hex()).collect(),
        directions: path.directions,
    }))
}

async fn get_balance(State(state): State<AppState>, Json(req): Json<BalanceRequest>) -> Result<Json<Balance>, ApiError> {
    let secret = parse_secret(&req.treasury_priv)?;
    let balance = withdraw::balance(&state.ledger, state.config.tree_depth, secret).await?;
    tracing::info!(leaves = balance.leaves.len(), total = %balance.total, "balance scanned");
    Ok(Json(balance))
}

async fn create_withdrawal(
    State(state): State<AppState>,
    Json(req): Json<WithdrawalRequest>,
) -> Result<Json<WithdrawOutcome>, ApiError> {
    let treasury_priv = parse_secret(&req.treasury_priv)?;
    let change_nonce = KeyPair::generate(&mut OsRng)?;
    let keys = state.ensure_keys().await?;

    let outcome = withdraw::withdraw(
        &state.ledger,
        &state.prover,
        Arc::clone(&keys.vk),
        flow_params(&state),
        WithdrawRequest { treasury_priv, amount: req.amount, targets: req.targets },
        change_nonce,
    )
    .await
    .inspect_err(|e| tracing::warn!(error = %e, "withdrawal aborted"))?;

    Ok(Json(outcome))
}

async fn format_calldata(Json(req): Json<CalldataRequest>) -> Result<Json<CalldataResponse>, ApiError> {
    let calldata = calldata::format(&req.proof, &req.public_signals)?;
    let solidity = calldata.to_solidity();
    Ok(Json(CalldataResponse { calldata, solidity }))
}

async fn get_vk(State(state): State<AppState>) -> Result<Json<ZkVkResponse>, ApiError> {
    let keys = state.ensure_keys().await?;
    let vk_bytes = serialize_vk(keys.vk.as_ref())?;

    Ok(Json(ZkVkResponse {
        curve: "bn254".to_string(),
        proof_system: "groth16".to_string(),
        n_public: keys.json.n_public,
        vk_b64: base64::engine::general_purpose::STANDARD.encode(vk_bytes),
        vk_json: keys.json.as_ref().clone(),
    }))
}

async fn list_outbox(
    State(state): State<AppState>,
    Query(params): Query<OutboxParams>,
) -> Result<Json<Vec<OutboxItem>>, ApiError> {
    let rows = db::list_outbox(&state.db, params.status.as_deref()).await?;
    Ok(Json(
        rows.into_iter()
            .map(|e| OutboxItem {
                id: e.id,
                kind: e.kind,
                status: e.status,
                created_at: e.created_at,
                payload: e.payload,
            })
            .collect(),
    ))
}
