//! HTTP request/response types
//!
//! JSON crossing the edge is validated into these fixed shapes; everything
//! past the handlers works on typed records and micro-unit amounts only.

use crate::models::TxReply;
use serde::{Deserialize, Serialize};

/// Body of POST /deposit and POST /withdraw
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionRequest {
    pub account_id: String,
    pub amount: f64,
    pub transaction_id: String,
}

/// Reply to POST /deposit and POST /withdraw
#[derive(Debug, Clone, Serialize)]
pub struct TransactionResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_balance: Option<f64>,
    pub transaction_id: String,
}

impl TransactionResponse {
    /// Edge-level rejection (validation, internal error); no ledger record
    /// exists for these.
    pub fn rejected(transaction_id: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            new_balance: None,
            transaction_id: transaction_id.to_string(),
        }
    }
}

impl From<TxReply> for TransactionResponse {
    fn from(reply: TxReply) -> Self {
        Self {
            success: reply.success,
            message: reply.message,
            new_balance: reply.new_balance.map(|b| b.to_f64()),
            transaction_id: reply.transaction_id,
        }
    }
}

/// Body of POST /balance
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceRequest {
    pub account_id: String,
}

/// Reply to POST /balance
#[derive(Debug, Clone, Serialize)]
pub struct BalanceResponse {
    pub success: bool,
    pub balance: f64,
    pub message: String,
}

/// Reply to GET /health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
