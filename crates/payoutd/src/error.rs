use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use payout_core::{StoreError, WithdrawalStatus};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PayoutError>;

#[derive(Error, Debug)]
pub enum PayoutError {
    #[error("Withdrawal not found")]
    NotFound,

    #[error("Withdrawal already processed (status: {0})")]
    AlreadyProcessed(WithdrawalStatus),

    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: i64, requested: i64 },

    #[error("Transfer build failed: {0}")]
    TransferBuildFailed(String),

    #[error("Broadcast failed: {0}")]
    BroadcastFailed(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),
}

impl From<StoreError> for PayoutError {
    fn from(err: StoreError) -> Self {
        PayoutError::Persistence(err.to_string())
    }
}

impl IntoResponse for PayoutError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            PayoutError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            PayoutError::AlreadyProcessed(_) => (StatusCode::CONFLICT, self.to_string()),
            PayoutError::InsufficientBalance { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }
            PayoutError::TransferBuildFailed(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            PayoutError::BroadcastFailed(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            PayoutError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(json!({
            "success": false,
            "error": message,
        }));

        (status, body).into_response()
    }
}
