//! Wallet engine - in-memory balance map + durable transaction ledger
//!
//! All operations are synchronous and serialized per engine instance; the
//! caller wraps the engine in a lock. Each mutation follows the WAL
//! discipline:
//!
//! 1. Append PENDING (durable)
//! 2. Apply the balance change in memory
//! 3. Append COMMIT (durable)
//!
//! A crash between 1 and 3 leaves a PENDING record that [`WalletEngine::recover`]
//! rolls back at the next startup; the balance effect only exists once the
//! COMMIT record does. Reusing a `transaction_id` replays the recorded
//! outcome without touching the WAL or the balance.

use crate::core_types::{AccountId, TransactionId};
use crate::ledger_wal::{
    BalanceSnapshotter, CommitPayload, LedgerRecovery, LedgerWalWriter, PendingPayload,
    LEDGER_WAL_FILE, SNAPSHOT_DIR,
};
use crate::models::{TransactionRecord, TxKind, TxReply, TxStatus};
use crate::money::ScaledAmount;
use rustc_hash::FxHashMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Take a balance snapshot every this many committed operations by default
pub const DEFAULT_SNAPSHOT_INTERVAL_OPS: u64 = 1000;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    /// Mutation attempted before `recover()` ran
    #[error("engine not recovered")]
    NotRecovered,

    #[error("ledger corrupted: {0}")]
    Corruption(String),

    #[error("durability failure: {0}")]
    Durability(#[from] io::Error),
}

/// The wallet engine: balance map, transaction ledger, WAL.
pub struct WalletEngine {
    data_dir: PathBuf,
    balances: FxHashMap<AccountId, ScaledAmount>,
    ledger: FxHashMap<TransactionId, TransactionRecord>,
    wal: LedgerWalWriter,
    snapshotter: BalanceSnapshotter,
    snapshot_interval_ops: u64,
    ops_since_snapshot: u64,
    ready: bool,
}

impl WalletEngine {
    /// Open the engine over `data_dir`, rebuilding state from Snapshot + WAL.
    ///
    /// `recover()` must be called before the engine accepts mutations.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, EngineError> {
        Self::open_with_snapshot_interval(data_dir, DEFAULT_SNAPSHOT_INTERVAL_OPS)
    }

    pub fn open_with_snapshot_interval(
        data_dir: impl AsRef<Path>,
        snapshot_interval_ops: u64,
    ) -> Result<Self, EngineError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;

        let state = LedgerRecovery::new(&data_dir).recover().map_err(|e| {
            if e.kind() == io::ErrorKind::InvalidData {
                EngineError::Corruption(e.to_string())
            } else {
                EngineError::Durability(e)
            }
        })?;

        let wal = LedgerWalWriter::open(data_dir.join(LEDGER_WAL_FILE), state.next_seq_id)?;
        let snapshotter = BalanceSnapshotter::new(data_dir.join(SNAPSHOT_DIR));

        Ok(Self {
            data_dir,
            balances: state.balances,
            ledger: state.ledger,
            wal,
            snapshotter,
            snapshot_interval_ops,
            ops_since_snapshot: 0,
            ready: false,
        })
    }

    /// Resolve crash leftovers and open the engine for mutations.
    ///
    /// Called exactly once at startup. Every record still PENDING is marked
    /// ROLLED_BACK (durably); the in-flight transaction is discarded and the
    /// client retries with a fresh `transaction_id`.
    pub fn recover(&mut self) -> Result<(), EngineError> {
        let pending_ids: Vec<TransactionId> = self
            .ledger
            .values()
            .filter(|r| r.status == TxStatus::Pending)
            .map(|r| r.transaction_id.clone())
            .collect();

        for transaction_id in &pending_ids {
            self.wal.append_rollback(transaction_id)?;
            if let Some(record) = self.ledger.get_mut(transaction_id) {
                record.status = TxStatus::RolledBack;
                record.success = false;
                record.new_balance = None;
            }
            tracing::warn!(
                transaction_id = %transaction_id,
                "Rolled back in-flight transaction"
            );
        }

        self.ready = true;
        tracing::info!(
            data_dir = %self.data_dir.display(),
            accounts = self.balances.len(),
            transactions = self.ledger.len(),
            rolled_back = pending_ids.len(),
            "Wallet engine recovered"
        );
        Ok(())
    }

    /// Credit `amount` to `account_id`, exactly once per `transaction_id`.
    pub fn deposit(
        &mut self,
        account_id: &str,
        amount: ScaledAmount,
        transaction_id: &str,
    ) -> Result<TxReply, EngineError> {
        self.apply(TxKind::Deposit, account_id, amount, transaction_id)
    }

    /// Debit `amount` from `account_id`, exactly once per `transaction_id`.
    ///
    /// An unknown account has balance 0, so the withdrawal commits with
    /// `success=false` and message "insufficient balance".
    pub fn withdraw(
        &mut self,
        account_id: &str,
        amount: ScaledAmount,
        transaction_id: &str,
    ) -> Result<TxReply, EngineError> {
        self.apply(TxKind::Withdraw, account_id, amount, transaction_id)
    }

    /// Current balance; unknown accounts read as 0.
    pub fn get_balance(&self, account_id: &str) -> ScaledAmount {
        self.balances
            .get(account_id)
            .copied()
            .unwrap_or(ScaledAmount::ZERO)
    }

    /// Ledger lookup by transaction id.
    pub fn transaction(&self, transaction_id: &str) -> Option<&TransactionRecord> {
        self.ledger.get(transaction_id)
    }

    /// Number of ledger records (for inspection and tests).
    pub fn ledger_len(&self) -> usize {
        self.ledger.len()
    }

    fn apply(
        &mut self,
        kind: TxKind,
        account_id: &str,
        amount: ScaledAmount,
        transaction_id: &str,
    ) -> Result<TxReply, EngineError> {
        if !self.ready {
            return Err(EngineError::NotRecovered);
        }
        if account_id.is_empty() {
            return Err(EngineError::Validation(
                "account_id must not be empty".to_string(),
            ));
        }
        if transaction_id.is_empty() {
            return Err(EngineError::Validation(
                "transaction_id must not be empty".to_string(),
            ));
        }
        if amount.is_zero() {
            return Err(EngineError::Validation(
                "amount must be positive".to_string(),
            ));
        }

        // Idempotent replay: the recorded outcome, verbatim
        if let Some(existing) = self.ledger.get(transaction_id) {
            tracing::debug!(
                transaction_id = %transaction_id,
                status = ?existing.status,
                "Idempotent replay"
            );
            return Ok(existing.reply());
        }

        let record = TransactionRecord::pending(transaction_id, account_id, amount, kind);
        self.wal.append_pending(&PendingPayload {
            transaction_id: record.transaction_id.clone(),
            account_id: record.account_id.clone(),
            kind,
            amount,
            created_at_ms: record.created_at_ms,
        })?;
        self.ledger.insert(transaction_id.to_string(), record);

        let previous = self.get_balance(account_id);
        let (success, new_balance, message) = match kind {
            TxKind::Deposit => match previous.checked_add(amount) {
                Some(nb) => (true, Some(nb), "ok"),
                None => (false, None, "balance overflow"),
            },
            TxKind::Withdraw => match previous.checked_sub(amount) {
                Some(nb) => (true, Some(nb), "ok"),
                None => (false, None, "insufficient balance"),
            },
        };

        // Balance change strictly before commit: a crash here leaves only a
        // PENDING record and the in-memory change evaporates with the process.
        if let Some(nb) = new_balance {
            self.balances.insert(account_id.to_string(), nb);
        }

        let commit = CommitPayload {
            transaction_id: transaction_id.to_string(),
            account_id: account_id.to_string(),
            kind,
            success,
            new_balance,
            message: message.to_string(),
        };

        match self.wal.append_commit(&commit) {
            Ok(seq_id) => {
                let record = self
                    .ledger
                    .get_mut(transaction_id)
                    .ok_or_else(|| EngineError::Corruption("ledger record vanished".to_string()))?;
                record.status = TxStatus::Committed;
                record.success = success;
                record.new_balance = new_balance;
                record.message = message.to_string();
                let reply = record.reply();

                self.maybe_snapshot(seq_id);
                Ok(reply)
            }
            Err(e) => {
                // Undo the in-memory effect and try to settle the WAL; if the
                // rollback append also fails, the lone PENDING record is
                // resolved by recovery at the next startup.
                if new_balance.is_some() {
                    self.balances.insert(account_id.to_string(), previous);
                }
                if let Err(rb) = self.wal.append_rollback(transaction_id) {
                    tracing::error!(
                        transaction_id = %transaction_id,
                        error = %rb,
                        "Rollback append failed after commit failure"
                    );
                }
                if let Some(record) = self.ledger.get_mut(transaction_id) {
                    record.status = TxStatus::RolledBack;
                }
                Err(EngineError::Durability(e))
            }
        }
    }

    fn maybe_snapshot(&mut self, last_seq: u64) {
        self.ops_since_snapshot += 1;
        if self.snapshot_interval_ops == 0 || self.ops_since_snapshot < self.snapshot_interval_ops {
            return;
        }
        self.ops_since_snapshot = 0;
        match self.snapshotter.create_snapshot(&self.balances, last_seq) {
            Ok(path) => {
                tracing::debug!(path = %path.display(), last_seq, "Balance snapshot written");
            }
            Err(e) => {
                // The WAL already holds everything; a failed snapshot only
                // lengthens the next replay.
                tracing::warn!(error = %e, "Balance snapshot failed");
            }
        }
    }
}

// ============================================================
// Unit Tests
// ============================================================
