//! Ledger WAL writer/reader
//!
//! Business-layer WAL operations for the wallet engine, built on top of the
//! binary format in [`crate::wal`]. Every append is flushed and fsynced
//! before returning: a status transition the engine reports as durable is
//! durable.

use crate::core_types::{AccountId, SeqNum, TransactionId};
use crate::models::TxKind;
use crate::money::ScaledAmount;
use crate::wal::{WalReader, WalRecordType, WalWriter};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Result};
use std::path::Path;

// ============================================================
// PAYLOAD DEFINITIONS
// ============================================================

/// Pending record payload (entry_type = 1)
///
/// Written before any balance effect; carries everything needed to rebuild
/// the ledger entry on replay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingPayload {
    pub transaction_id: TransactionId,
    pub account_id: AccountId,
    pub kind: TxKind,
    pub amount: ScaledAmount,
    pub created_at_ms: u64,
}

/// Commit record payload (entry_type = 2)
///
/// `new_balance` is present exactly when `success` is true; a failed
/// business outcome (insufficient balance) still commits, with no balance
/// effect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitPayload {
    pub transaction_id: TransactionId,
    pub account_id: AccountId,
    pub kind: TxKind,
    pub success: bool,
    pub new_balance: Option<ScaledAmount>,
    pub message: String,
}

/// Rollback record payload (entry_type = 3)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RollbackPayload {
    pub transaction_id: TransactionId,
}

/// A decoded ledger WAL entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEntry {
    Pending(PendingPayload),
    Commit(CommitPayload),
    Rollback(RollbackPayload),
}

// ============================================================
// LEDGER WAL WRITER
// ============================================================

/// Append-only ledger WAL writer.
///
/// # Thread safety
/// Owned by a single engine instance; the engine's lock serializes access.
pub struct LedgerWalWriter {
    writer: WalWriter<BufWriter<File>>,
    // Second handle onto the same file, kept for fsync after BufWriter flush
    sync_handle: File,
}

impl LedgerWalWriter {
    /// Open (or create) the WAL at `path`, continuing at `start_seq`.
    pub fn open(path: impl AsRef<Path>, start_seq: SeqNum) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        let sync_handle = file.try_clone()?;
        let writer = WalWriter::new(BufWriter::new(file), start_seq);

        Ok(Self {
            writer,
            sync_handle,
        })
    }

    /// Append a PENDING record. Durable on return.
    pub fn append_pending(&mut self, payload: &PendingPayload) -> Result<SeqNum> {
        self.append(WalRecordType::Pending, payload)
    }

    /// Append a COMMIT record. Durable on return.
    pub fn append_commit(&mut self, payload: &CommitPayload) -> Result<SeqNum> {
        self.append(WalRecordType::Commit, payload)
    }

    /// Append a ROLLBACK record. Durable on return.
    pub fn append_rollback(&mut self, transaction_id: &str) -> Result<SeqNum> {
        let payload = RollbackPayload {
            transaction_id: transaction_id.to_string(),
        };
        self.append(WalRecordType::Rollback, &payload)
    }

    fn append<T: Serialize>(&mut self, record_type: WalRecordType, payload: &T) -> Result<SeqNum> {
        let payload_bytes = bincode::serialize(payload)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let seq_id = self.writer.write_record(record_type, &payload_bytes)?;
        self.writer.flush()?;
        self.sync_handle.sync_data()?;

        Ok(seq_id)
    }

    /// Next sequence number to be assigned
    pub fn next_seq(&self) -> SeqNum {
        self.writer.next_seq()
    }
}

// ============================================================
// LEDGER WAL READER
// ============================================================

/// Sequential reader over a ledger WAL file
pub struct LedgerWalReader {
    reader: WalReader<BufReader<File>>,
}

impl LedgerWalReader {
    /// Open a WAL file for reading
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: WalReader::new(BufReader::new(file)),
        })
    }

    /// Read and decode the next entry.
    ///
    /// Error kinds mirror [`crate::wal::WalReader::read_record`]:
    /// `UnexpectedEof` marks a torn tail, `InvalidData` marks corruption.
    pub fn read_entry(&mut self) -> Result<Option<(SeqNum, LedgerEntry)>> {
        let Some(record) = self.reader.read_record()? else {
            return Ok(None);
        };

        let seq_id = record.header.seq_id;
        let entry = match WalRecordType::try_from(record.header.entry_type)? {
            WalRecordType::Pending => LedgerEntry::Pending(decode(&record.payload)?),
            WalRecordType::Commit => LedgerEntry::Commit(decode(&record.payload)?),
            WalRecordType::Rollback => LedgerEntry::Rollback(decode(&record.payload)?),
        };

        Ok(Some((seq_id, entry)))
    }

    /// Bytes covered by fully decoded entries.
    pub fn bytes_consumed(&self) -> u64 {
        self.reader.bytes_consumed()
    }
}

fn decode<'a, T: Deserialize<'a>>(payload: &'a [u8]) -> Result<T> {
    bincode::deserialize(payload)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

// ============================================================
// Unit Tests
// ============================================================
