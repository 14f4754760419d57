//! # error
//!
//! Centralised application error type.
//!
//! Every handler returns `Result<_, AppError>`. Axum's `IntoResponse` impl
//! converts these into structured JSON error bodies. Inside the market loop
//! the same type marks a per-symbol fault: it is logged and that symbol is
//! skipped for the tick.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::portfolio::LedgerError;

#[derive(Debug, Error)]
pub enum AppError {
    /// The request was well-formed but asked for something invalid.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unknown symbol / user.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Price history in a state the analytics cannot process
    /// (non-positive or non-finite price).
    #[error("Analytics error: {0}")]
    Analytics(String),

    /// The Ledger Store could not be reached or rejected the operation.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Catch-all for unexpected failures.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg)   => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Analytics(msg)  => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::Ledger(err)     => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
            AppError::Internal(err)   => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal error: {err}"),
            ),
        };

        let body = Json(json!({
            "ok":    false,
            "error": message,
        }));

        (status, body).into_response()
    }
}
