//! HTTP route handlers
//!
//! Thin adaptors: validate the JSON body, hand the typed request to the
//! primary orchestrator, map the outcome to a status code. Business
//! failures (insufficient balance) return 400 with the committed record's
//! message, and so do their idempotent replays, mirroring the original
//! response.

use axum::{Json, extract::State, http::StatusCode};

use crate::engine::EngineError;
use crate::models::TxKind;
use crate::money::ScaledAmount;

use super::state::AppState;
use super::types::{
    BalanceRequest, BalanceResponse, HealthResponse, TransactionRequest, TransactionResponse,
};

/// POST /deposit
pub async fn deposit(
    State(state): State<AppState>,
    Json(req): Json<TransactionRequest>,
) -> (StatusCode, Json<TransactionResponse>) {
    apply_transaction(state, TxKind::Deposit, req).await
}

/// POST /withdraw
pub async fn withdraw(
    State(state): State<AppState>,
    Json(req): Json<TransactionRequest>,
) -> (StatusCode, Json<TransactionResponse>) {
    apply_transaction(state, TxKind::Withdraw, req).await
}

async fn apply_transaction(
    state: AppState,
    kind: TxKind,
    req: TransactionRequest,
) -> (StatusCode, Json<TransactionResponse>) {
    let amount = match validate(&req) {
        Ok(amount) => amount,
        Err(message) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(TransactionResponse::rejected(&req.transaction_id, message)),
            );
        }
    };

    match state
        .primary
        .execute(kind, &req.account_id, amount, &req.transaction_id)
        .await
    {
        Ok(reply) => {
            let status = if reply.success {
                StatusCode::OK
            } else {
                StatusCode::BAD_REQUEST
            };
            (status, Json(reply.into()))
        }
        Err(EngineError::Validation(message)) => (
            StatusCode::BAD_REQUEST,
            Json(TransactionResponse::rejected(&req.transaction_id, message)),
        ),
        Err(e) => {
            tracing::error!(
                transaction_id = %req.transaction_id,
                kind = ?kind,
                error = %e,
                "Transaction failed internally"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(TransactionResponse::rejected(
                    &req.transaction_id,
                    "internal error",
                )),
            )
        }
    }
}

fn validate(req: &TransactionRequest) -> Result<ScaledAmount, &'static str> {
    if req.account_id.is_empty() {
        return Err("account_id must not be empty");
    }
    if req.transaction_id.is_empty() {
        return Err("transaction_id must not be empty");
    }
    if !req.amount.is_finite() || req.amount <= 0.0 {
        return Err("amount must be positive");
    }
    // A positive value below one micro-unit rounds to zero
    match ScaledAmount::from_f64(req.amount) {
        Some(amount) if !amount.is_zero() => Ok(amount),
        _ => Err("amount must be positive"),
    }
}

/// POST /balance
pub async fn balance(
    State(state): State<AppState>,
    Json(req): Json<BalanceRequest>,
) -> (StatusCode, Json<BalanceResponse>) {
    if req.account_id.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(BalanceResponse {
                success: false,
                balance: 0.0,
                message: "account_id must not be empty".to_string(),
            }),
        );
    }

    let balance = state.primary.get_balance(&req.account_id);
    (
        StatusCode::OK,
        Json(BalanceResponse {
            success: true,
            balance: balance.to_f64(),
            message: "ok".to_string(),
        }),
    )
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: if state.is_ready() {
            "healthy"
        } else {
            "initializing"
        },
    })
}
