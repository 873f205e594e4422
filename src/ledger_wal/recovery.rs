//! Startup recovery
//!
//! Rebuilds engine state from Snapshot + WAL. The ledger WAL is the source
//! of truth: the full log is scanned to reconstruct the transaction ledger,
//! and committed balance effects past the snapshot watermark are re-applied.
//!
//! A torn record at the tail of the WAL (crash mid-append) ends the scan; a
//! checksum mismatch anywhere is corruption and refuses recovery, so a
//! damaged ledger is never silently truncated.

use super::snapshot::BalanceSnapshotter;
use super::wal::{LedgerEntry, LedgerWalReader};
use super::{LEDGER_WAL_FILE, SNAPSHOT_DIR};
use crate::core_types::{AccountId, SeqNum, TransactionId};
use crate::models::{TransactionRecord, TxStatus};
use crate::money::ScaledAmount;
use rustc_hash::FxHashMap;
use std::io;
use std::path::{Path, PathBuf};

// ============================================================
// Recovery State
// ============================================================

/// Engine state rebuilt by recovery.
///
/// Records still PENDING in `ledger` are crash leftovers; the engine rolls
/// them back before accepting operations.
pub struct RecoveryState {
    pub balances: FxHashMap<AccountId, ScaledAmount>,
    pub ledger: FxHashMap<TransactionId, TransactionRecord>,
    pub next_seq_id: SeqNum,
}

// ============================================================
// Ledger Recovery
// ============================================================

pub struct LedgerRecovery {
    data_dir: PathBuf,
}

impl LedgerRecovery {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    /// Recover engine state from Snapshot + WAL
    ///
    /// Recovery flow:
    /// 1. Load latest balance snapshot (cold start with empty state if none)
    /// 2. Scan the full WAL to rebuild the transaction ledger
    /// 3. Re-apply committed balances for entries past the snapshot watermark
    /// 4. Return state; PENDING leftovers are resolved by the engine
    pub fn recover(&self) -> io::Result<RecoveryState> {
        let snapshotter = BalanceSnapshotter::new(self.data_dir.join(SNAPSHOT_DIR));

        let (mut balances, snapshot_seq) = match snapshotter.load_latest_snapshot()? {
            Some((metadata, loaded)) => {
                tracing::info!(
                    seq_id = metadata.wal_seq_id,
                    accounts = metadata.account_count,
                    "Loaded balance snapshot"
                );
                (loaded, metadata.wal_seq_id)
            }
            None => {
                tracing::info!("No snapshot found, cold start");
                (FxHashMap::default(), 0)
            }
        };

        let mut ledger: FxHashMap<TransactionId, TransactionRecord> = FxHashMap::default();
        let mut last_seq = snapshot_seq;

        let wal_file = self.data_dir.join(LEDGER_WAL_FILE);
        if wal_file.exists() {
            let mut reader = LedgerWalReader::open(&wal_file)?;
            let mut replayed = 0u64;

            loop {
                let (seq_id, entry) = match reader.read_entry() {
                    Ok(Some(next)) => next,
                    Ok(None) => break,
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                        // Crash mid-append: the torn record never became
                        // durable. Cut the file back to the last complete
                        // record so future appends don't land after garbage.
                        let valid_len = reader.bytes_consumed();
                        tracing::warn!(
                            after_seq = last_seq,
                            valid_len,
                            "Torn record at WAL tail, truncating"
                        );
                        let file = std::fs::OpenOptions::new().write(true).open(&wal_file)?;
                        file.set_len(valid_len)?;
                        break;
                    }
                    Err(e) => return Err(e),
                };

                self.apply_entry(&mut ledger, &mut balances, seq_id, snapshot_seq, entry);
                last_seq = last_seq.max(seq_id);
                replayed += 1;
            }

            tracing::info!(entries = replayed, last_seq, "Replayed ledger WAL");
        } else {
            tracing::info!("No WAL file found");
        }

        Ok(RecoveryState {
            balances,
            ledger,
            next_seq_id: last_seq + 1,
        })
    }

    fn apply_entry(
        &self,
        ledger: &mut FxHashMap<TransactionId, TransactionRecord>,
        balances: &mut FxHashMap<AccountId, ScaledAmount>,
        seq_id: SeqNum,
        snapshot_seq: SeqNum,
        entry: LedgerEntry,
    ) {
        match entry {
            LedgerEntry::Pending(p) => {
                ledger.insert(
                    p.transaction_id.clone(),
                    TransactionRecord {
                        transaction_id: p.transaction_id,
                        account_id: p.account_id,
                        amount: p.amount,
                        kind: p.kind,
                        status: TxStatus::Pending,
                        success: false,
                        new_balance: None,
                        message: String::new(),
                        created_at_ms: p.created_at_ms,
                    },
                );
            }
            LedgerEntry::Commit(c) => {
                // Snapshot already contains effects up to its watermark
                if c.success && seq_id > snapshot_seq {
                    if let Some(new_balance) = c.new_balance {
                        balances.insert(c.account_id.clone(), new_balance);
                    }
                }
                match ledger.get_mut(&c.transaction_id) {
                    Some(record) => {
                        record.status = TxStatus::Committed;
                        record.success = c.success;
                        record.new_balance = c.new_balance;
                        record.message = c.message;
                    }
                    None => {
                        tracing::warn!(
                            transaction_id = %c.transaction_id,
                            seq_id,
                            "Commit without pending record, skipped"
                        );
                    }
                }
            }
            LedgerEntry::Rollback(r) => match ledger.get_mut(&r.transaction_id) {
                Some(record) => {
                    record.status = TxStatus::RolledBack;
                    record.success = false;
                    record.new_balance = None;
                }
                None => {
                    tracing::warn!(
                        transaction_id = %r.transaction_id,
                        seq_id,
                        "Rollback without pending record, skipped"
                    );
                }
            },
        }
    }
}

// ============================================================
// Unit Tests
// ============================================================
