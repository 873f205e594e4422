//! Balance snapshot creation/loading
//!
//! Atomic snapshot creation with COMPLETE marker and checksum verification.
//! The snapshot is an optimization for recovery; the ledger WAL remains the
//! source of truth and is replayed past the snapshot's watermark.

use crate::core_types::{AccountId, SeqNum};
use crate::money::ScaledAmount;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

// ============================================================
// Snapshot Metadata
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub format_version: u32,
    /// Highest WAL seq_id whose effects the snapshot includes
    pub wal_seq_id: SeqNum,
    pub account_count: usize,
    pub balances_checksum: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================
// Balance Snapshotter
// ============================================================

pub struct BalanceSnapshotter {
    snapshot_dir: PathBuf,
}

impl BalanceSnapshotter {
    pub fn new(snapshot_dir: impl AsRef<Path>) -> Self {
        Self {
            snapshot_dir: snapshot_dir.as_ref().to_path_buf(),
        }
    }

    /// Create an atomic snapshot
    ///
    /// Protocol:
    /// 1. Create .tmp-{timestamp}/
    /// 2. Write balances.bin (bincode)
    /// 3. Calculate CRC64 checksum
    /// 4. Write metadata.json
    /// 5. Write COMPLETE marker
    /// 6. Atomic rename to snapshot-{seq}/
    /// 7. Update latest symlink
    pub fn create_snapshot(
        &self,
        balances: &FxHashMap<AccountId, ScaledAmount>,
        wal_seq_id: SeqNum,
    ) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.snapshot_dir)?;

        // 1. Temporary directory
        let timestamp = Utc::now().timestamp_millis();
        let tmp_dir = self.snapshot_dir.join(format!(".tmp-{}", timestamp));
        fs::create_dir_all(&tmp_dir)?;

        // 2. Serialize balances
        let balances_path = tmp_dir.join("balances.bin");
        let balances_bytes = bincode::serialize(balances)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        {
            let file = File::create(&balances_path)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(&balances_bytes)?;
            writer.flush()?;
        }

        // 3. CRC64 checksum
        let checksum = calculate_crc64(&balances_bytes);

        // 4. metadata.json
        let metadata = SnapshotMetadata {
            format_version: 1,
            wal_seq_id,
            account_count: balances.len(),
            balances_checksum: checksum,
            created_at: Utc::now(),
        };

        let metadata_path = tmp_dir.join("metadata.json");
        let metadata_json = serde_json::to_string_pretty(&metadata)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&metadata_path, metadata_json)?;

        // 5. COMPLETE marker
        fs::write(tmp_dir.join("COMPLETE"), "")?;

        // 6. Atomic rename
        let snapshot_dir = self.snapshot_dir.join(format!("snapshot-{}", wal_seq_id));
        if snapshot_dir.exists() {
            fs::remove_dir_all(&snapshot_dir)?;
        }
        fs::rename(&tmp_dir, &snapshot_dir)?;

        // 7. Update latest symlink
        let latest_link = self.snapshot_dir.join("latest");
        if latest_link.exists() {
            fs::remove_file(&latest_link)?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::symlink;
            symlink(format!("snapshot-{}", wal_seq_id), &latest_link)?;
        }

        #[cfg(windows)]
        {
            use std::os::windows::fs::symlink_dir;
            symlink_dir(format!("snapshot-{}", wal_seq_id), &latest_link)?;
        }

        Ok(snapshot_dir)
    }

    /// Load the latest snapshot, verifying marker and checksum.
    pub fn load_latest_snapshot(
        &self,
    ) -> io::Result<Option<(SnapshotMetadata, FxHashMap<AccountId, ScaledAmount>)>> {
        let latest_link = self.snapshot_dir.join("latest");

        if !latest_link.exists() {
            return Ok(None);
        }

        let complete_path = latest_link.join("COMPLETE");
        if !complete_path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Incomplete snapshot (missing COMPLETE marker)",
            ));
        }

        let metadata_json = fs::read_to_string(latest_link.join("metadata.json"))?;
        let metadata: SnapshotMetadata = serde_json::from_str(&metadata_json)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = File::open(latest_link.join("balances.bin"))?;
        let mut balances_bytes = Vec::new();
        file.read_to_end(&mut balances_bytes)?;

        let calculated = calculate_crc64(&balances_bytes);
        if calculated != metadata.balances_checksum {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Checksum mismatch: expected {}, got {}",
                    metadata.balances_checksum, calculated
                ),
            ));
        }

        let balances: FxHashMap<AccountId, ScaledAmount> = bincode::deserialize(&balances_bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        Ok(Some((metadata, balances)))
    }
}

// ============================================================
// CRC64 Checksum
// ============================================================

fn calculate_crc64(data: &[u8]) -> String {
    use crc::{CRC_64_ECMA_182, Crc};

    const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);
    format!("{:016x}", CRC64.checksum(data))
}

// ============================================================
// Unit Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_balances() -> FxHashMap<AccountId, ScaledAmount> {
        let mut balances = FxHashMap::default();
        balances.insert("alice".to_string(), ScaledAmount::from_micros(100_000_000));
        balances.insert("bob".to_string(), ScaledAmount::from_micros(250_000));
        balances
    }

    // --------------------------------------------------------
    // Test 1: Create snapshot atomically
    // --------------------------------------------------------
    #[test]
    fn test_create_snapshot_atomic() {
        let temp_dir = format!("target/test_snapshot_{}", std::process::id());
        let _ = fs::remove_dir_all(&temp_dir);

        let snapshotter = BalanceSnapshotter::new(&temp_dir);
        let snapshot_path = snapshotter.create_snapshot(&test_balances(), 42).unwrap();

        assert!(snapshot_path.join("metadata.json").exists());
        assert!(snapshot_path.join("balances.bin").exists());
        assert!(snapshot_path.join("COMPLETE").exists());
        assert!(PathBuf::from(&temp_dir).join("latest").exists());

        let _ = fs::remove_dir_all(&temp_dir);
    }

    // --------------------------------------------------------
    // Test 2: Load returns metadata and balances
    // --------------------------------------------------------
    #[test]
    fn test_load_snapshot() {
        let temp_dir = format!("target/test_snapshot_load_{}", std::process::id());
        let _ = fs::remove_dir_all(&temp_dir);

        let snapshotter = BalanceSnapshotter::new(&temp_dir);
        snapshotter.create_snapshot(&test_balances(), 42).unwrap();

        let (metadata, balances) = snapshotter.load_latest_snapshot().unwrap().unwrap();
        assert_eq!(metadata.wal_seq_id, 42);
        assert_eq!(metadata.account_count, 2);
        assert_eq!(
            balances["alice"],
            ScaledAmount::from_micros(100_000_000)
        );
        assert_eq!(balances["bob"], ScaledAmount::from_micros(250_000));

        let _ = fs::remove_dir_all(&temp_dir);
    }

    // --------------------------------------------------------
    // Test 3: Missing snapshot is a cold start, not an error
    // --------------------------------------------------------
    #[test]
    fn test_no_snapshot_is_none() {
        let temp_dir = format!("target/test_snapshot_none_{}", std::process::id());
        let _ = fs::remove_dir_all(&temp_dir);

        let snapshotter = BalanceSnapshotter::new(&temp_dir);
        assert!(snapshotter.load_latest_snapshot().unwrap().is_none());
    }

    // --------------------------------------------------------
    // Test 4: Incomplete snapshot rejected
    // --------------------------------------------------------
    #[test]
    fn test_incomplete_snapshot_rejected() {
        let temp_dir = format!("target/test_snapshot_incomplete_{}", std::process::id());
        let _ = fs::remove_dir_all(&temp_dir);
        fs::create_dir_all(&temp_dir).unwrap();

        let incomplete_dir = PathBuf::from(&temp_dir).join("snapshot-99");
        fs::create_dir_all(&incomplete_dir).unwrap();
        fs::write(incomplete_dir.join("metadata.json"), "{}").unwrap();
        fs::write(incomplete_dir.join("balances.bin"), "").unwrap();

        let latest_link = PathBuf::from(&temp_dir).join("latest");
        #[cfg(unix)]
        {
            use std::os::unix::fs::symlink;
            symlink("snapshot-99", &latest_link).unwrap();
        }
        #[cfg(windows)]
        {
            use std::os::windows::fs::symlink_dir;
            symlink_dir("snapshot-99", &latest_link).unwrap();
        }

        let snapshotter = BalanceSnapshotter::new(&temp_dir);
        let result = snapshotter.load_latest_snapshot();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("COMPLETE"));

        let _ = fs::remove_dir_all(&temp_dir);
    }

    // --------------------------------------------------------
    // Test 5: Corrupted balances detected by checksum
    // --------------------------------------------------------
    #[test]
    fn test_checksum_corruption_detection() {
        let temp_dir = format!("target/test_snapshot_corrupt_{}", std::process::id());
        let _ = fs::remove_dir_all(&temp_dir);

        let snapshotter = BalanceSnapshotter::new(&temp_dir);
        snapshotter.create_snapshot(&test_balances(), 7).unwrap();

        let balances_path = PathBuf::from(&temp_dir).join("latest/balances.bin");
        let mut file = fs::OpenOptions::new()
            .write(true)
            .open(&balances_path)
            .unwrap();
        file.write_all(b"CORRUPTED_DATA").unwrap();

        let result = snapshotter.load_latest_snapshot();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Checksum mismatch"));

        let _ = fs::remove_dir_all(&temp_dir);
    }
}
