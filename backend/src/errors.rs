use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use thiserror::Error;
use treasury_zk::ZkError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("insufficient funds: requested {requested}, selected leaves hold {available}")]
    InsufficientFunds { requested: u128, available: u128 },

    #[error(transparent)]
    Zk(#[from] ZkError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error")]
    Internal,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Zk(e) => zk_status(e),
            ApiError::Config(_) | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn zk_status(e: &ZkError) -> StatusCode {
    match e {
        ZkError::IndexOutOfRange { .. } => StatusCode::NOT_FOUND,
        ZkError::RootMismatch { .. } | ZkError::TreeFull { .. } => StatusCode::CONFLICT,
        ZkError::VerificationFailed => StatusCode::UNPROCESSABLE_ENTITY,
        ZkError::ProvingBackendFailure(_) => StatusCode::BAD_GATEWAY,
        ZkError::DivisionByZero | ZkError::Hash(_) | ZkError::Serialization(_) | ZkError::Ark(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::BAD_REQUEST,
    }
}

/// Logs a storage failure and hides its details from the client.
pub fn db_err(e: sqlx::Error) -> ApiError {
    tracing::error!(error = %e, "database error");
    ApiError::Internal
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let msg = match &self {
            ApiError::Internal | ApiError::Config(_) => "internal error".to_string(),
            ApiError::Zk(e) if status == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = %e, "zk failure");
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorBody { error: msg })).into_response()
    }
}
