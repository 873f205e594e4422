//! Ledger WAL - durable transaction ledger for the wallet engine
//!
//! Layered on the binary WAL format in [`crate::wal`]:
//! - `wal`: append Pending/Commit/Rollback records, fsync per append
//! - `snapshot`: atomic balance snapshots with COMPLETE marker + checksum
//! - `recovery`: snapshot load + WAL replay into engine state

pub mod recovery;
pub mod snapshot;
pub mod wal;

pub use recovery::{LedgerRecovery, RecoveryState};
pub use snapshot::{BalanceSnapshotter, SnapshotMetadata};
pub use wal::{
    CommitPayload, LedgerEntry, LedgerWalReader, LedgerWalWriter, PendingPayload, RollbackPayload,
};

/// WAL file name within a replica's state directory
pub const LEDGER_WAL_FILE: &str = "ledger.wal";

/// Snapshot directory name within a replica's state directory
pub const SNAPSHOT_DIR: &str = "snapshots";
