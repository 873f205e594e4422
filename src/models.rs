//! Transaction ledger records and replies

use crate::core_types::{AccountId, TransactionId};
use crate::money::ScaledAmount;
use serde::{Deserialize, Serialize};
use std::io;
use std::time::{SystemTime, UNIX_EPOCH};

/// Kind of a balance mutation
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxKind {
    Deposit = 1,
    Withdraw = 2,
}

impl TryFrom<u8> for TxKind {
    type Error = io::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Deposit),
            2 => Ok(Self::Withdraw),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unknown TxKind: {}", value),
            )),
        }
    }
}

/// Ledger status of a transaction record.
///
/// Monotonic: PENDING moves to COMMITTED or ROLLED_BACK, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Pending,
    Committed,
    RolledBack,
}

/// One entry of the transaction ledger, keyed by `transaction_id`.
///
/// Records are created PENDING, decided to COMMITTED (success true or
/// false) by the engine, or ROLLED_BACK by startup recovery. They are never
/// deleted; the ever-growing ledger is the idempotency lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: TransactionId,
    pub account_id: AccountId,
    pub amount: ScaledAmount,
    pub kind: TxKind,
    pub status: TxStatus,
    /// Defined only once status leaves PENDING
    pub success: bool,
    /// Defined only when success is true
    pub new_balance: Option<ScaledAmount>,
    pub message: String,
    pub created_at_ms: u64,
}

impl TransactionRecord {
    /// Fresh PENDING record at the start of deposit/withdraw.
    pub fn pending(
        transaction_id: &str,
        account_id: &str,
        amount: ScaledAmount,
        kind: TxKind,
    ) -> Self {
        Self {
            transaction_id: transaction_id.to_string(),
            account_id: account_id.to_string(),
            amount,
            kind,
            status: TxStatus::Pending,
            success: false,
            new_balance: None,
            message: String::new(),
            created_at_ms: now_ms(),
        }
    }

    /// The client-visible outcome of this record.
    pub fn reply(&self) -> TxReply {
        match self.status {
            TxStatus::Pending => TxReply {
                transaction_id: self.transaction_id.clone(),
                success: false,
                new_balance: None,
                message: "transaction pending".to_string(),
            },
            TxStatus::RolledBack => TxReply {
                transaction_id: self.transaction_id.clone(),
                success: false,
                new_balance: None,
                message: "transaction rolled back".to_string(),
            },
            TxStatus::Committed => TxReply {
                transaction_id: self.transaction_id.clone(),
                success: self.success,
                new_balance: self.new_balance,
                message: self.message.clone(),
            },
        }
    }
}

/// Outcome of a deposit/withdraw as seen by callers (HTTP edge, replication
/// peer). Two replicas diverge exactly when their replies for the same
/// transaction disagree on `success` or, for successful mutations, on
/// `new_balance`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReply {
    pub transaction_id: TransactionId,
    pub success: bool,
    pub new_balance: Option<ScaledAmount>,
    pub message: String,
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_kind_round_trip() {
        assert_eq!(TxKind::try_from(1).unwrap(), TxKind::Deposit);
        assert_eq!(TxKind::try_from(2).unwrap(), TxKind::Withdraw);
        assert!(TxKind::try_from(0).is_err());
        assert!(TxKind::try_from(3).is_err());
    }

    #[test]
    fn test_pending_record_reply_is_undecided() {
        let rec = TransactionRecord::pending("t1", "acct", ScaledAmount::from_micros(5), TxKind::Deposit);
        assert_eq!(rec.status, TxStatus::Pending);
        let reply = rec.reply();
        assert!(!reply.success);
        assert!(reply.new_balance.is_none());
    }

    #[test]
    fn test_rolled_back_reply_message() {
        let mut rec =
            TransactionRecord::pending("t2", "acct", ScaledAmount::from_micros(5), TxKind::Withdraw);
        rec.status = TxStatus::RolledBack;
        let reply = rec.reply();
        assert!(!reply.success);
        assert_eq!(reply.message, "transaction rolled back");
    }
}
