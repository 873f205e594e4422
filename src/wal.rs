//! Binary write-ahead log format
//!
//! Append-only record framing shared by the ledger WAL:
//! - 16-byte naturally aligned header
//! - CRC32 checksum per payload
//! - bincode serialization for payloads
//!
//! Atomicity with respect to crash comes from the framing: a torn write at
//! the tail of the file fails `read_exact` and is distinguishable from a
//! checksum mismatch inside the log, so readers can stop cleanly at a torn
//! tail while refusing to proceed past corruption.
//!
//! # Header Layout (16 bytes)
//!
//! ```text
//! ┌────────────┬───────────┬────────────────────────────────────┐
//! │ seq_id     │ 8 bytes   │ Monotonic sequence number          │
//! │ checksum   │ 4 bytes   │ CRC32 of payload                   │
//! │ payload_len│ 2 bytes   │ Payload size (max 64KB)            │
//! │ entry_type │ 1 byte    │ Record type (Pending/Commit/...)   │
//! │ version    │ 1 byte    │ Payload format version (0-255)     │
//! └────────────┴───────────┴────────────────────────────────────┘
//! ```

use crate::core_types::SeqNum;
use crc32fast::Hasher;
use std::io::{self, Read, Write};

// ============================================================
// CONSTANTS
// ============================================================

/// WAL header size in bytes (16 bytes, naturally aligned)
pub const WAL_HEADER_SIZE: usize = 16;

// ============================================================
// WAL HEADER (16 bytes)
// ============================================================

/// WAL record header.
///
/// Field order is optimized for natural alignment (no padding):
/// - seq_id (u64) = 8 bytes (8-byte aligned)
/// - checksum (u32) = 4 bytes
/// - payload_len (u16) + entry_type (u8) + version (u8) = 4 bytes
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalHeader {
    /// Monotonic sequence number (8 bytes)
    pub seq_id: SeqNum,
    /// CRC32 checksum of payload (4 bytes)
    pub checksum: u32,
    /// Payload size in bytes (2 bytes)
    pub payload_len: u16,
    /// Record type (see WalRecordType enum) (1 byte)
    pub entry_type: u8,
    /// Payload format version (1 byte)
    pub version: u8,
}

impl WalHeader {
    /// Create a new header with CRC32 checksum calculated from payload
    pub fn new(entry_type: WalRecordType, seq_id: SeqNum, payload: &[u8]) -> Self {
        Self {
            seq_id,
            checksum: crc32_checksum(payload),
            payload_len: payload.len() as u16,
            entry_type: entry_type as u8,
            version: 0,
        }
    }

    /// Serialize header to bytes (16 bytes)
    pub fn to_bytes(&self) -> [u8; WAL_HEADER_SIZE] {
        let mut buf = [0u8; WAL_HEADER_SIZE];
        buf[0..8].copy_from_slice(&self.seq_id.to_le_bytes());
        buf[8..12].copy_from_slice(&self.checksum.to_le_bytes());
        buf[12..14].copy_from_slice(&self.payload_len.to_le_bytes());
        buf[14] = self.entry_type;
        buf[15] = self.version;
        buf
    }

    /// Deserialize header from bytes
    pub fn from_bytes(buf: &[u8; WAL_HEADER_SIZE]) -> Self {
        Self {
            seq_id: u64::from_le_bytes([
                buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
            ]),
            checksum: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
            payload_len: u16::from_le_bytes([buf[12], buf[13]]),
            entry_type: buf[14],
            version: buf[15],
        }
    }

    /// Verify CRC32 checksum against payload
    pub fn verify_checksum(&self, payload: &[u8]) -> bool {
        self.checksum == crc32_checksum(payload)
    }
}

// ============================================================
// RECORD TYPES
// ============================================================

/// WAL record types
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalRecordType {
    /// Transaction accepted, balance effect not yet decided
    Pending = 1,
    /// Transaction decided (success true or false)
    Commit = 2,
    /// Pending transaction discarded by recovery
    Rollback = 3,
}

impl TryFrom<u8> for WalRecordType {
    type Error = io::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Pending),
            2 => Ok(Self::Commit),
            3 => Ok(Self::Rollback),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unknown WalRecordType: {}", value),
            )),
        }
    }
}

// ============================================================
// CRC32 HELPER
// ============================================================

/// Calculate CRC32 checksum of data
#[inline]
pub fn crc32_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

// ============================================================
// WAL WRITER
// ============================================================

/// WAL writer over any `Write` sink
pub struct WalWriter<W: Write> {
    writer: W,
    next_seq: SeqNum,
}

impl<W: Write> WalWriter<W> {
    /// Create a new WAL writer starting at `start_seq`
    pub fn new(writer: W, start_seq: SeqNum) -> Self {
        Self {
            writer,
            next_seq: start_seq,
        }
    }

    /// Write a record. Returns the assigned seq_id.
    pub fn write_record(&mut self, entry_type: WalRecordType, payload: &[u8]) -> io::Result<SeqNum> {
        let seq_id = self.next_seq;
        self.next_seq += 1;

        let header = WalHeader::new(entry_type, seq_id, payload);
        self.writer.write_all(&header.to_bytes())?;
        self.writer.write_all(payload)?;

        Ok(seq_id)
    }

    /// Flush buffered writes
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Next sequence number to be assigned
    pub fn next_seq(&self) -> SeqNum {
        self.next_seq
    }
}

// ============================================================
// WAL READER
// ============================================================

/// A single WAL record (header + payload)
#[derive(Debug)]
pub struct WalRecord {
    pub header: WalHeader,
    pub payload: Vec<u8>,
}

/// WAL reader over any `Read` source
pub struct WalReader<R: Read> {
    reader: R,
    bytes_consumed: u64,
}

impl<R: Read> WalReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            bytes_consumed: 0,
        }
    }

    /// Bytes covered by fully read records; the valid length of the log up
    /// to this point.
    pub fn bytes_consumed(&self) -> u64 {
        self.bytes_consumed
    }

    /// Read the next record.
    ///
    /// - `Ok(None)` at a clean EOF (file ends exactly on a record boundary)
    /// - `ErrorKind::UnexpectedEof` on a torn tail (crash mid-append)
    /// - `ErrorKind::InvalidData` on a checksum mismatch (corruption)
    pub fn read_record(&mut self) -> io::Result<Option<WalRecord>> {
        let mut header_buf = [0u8; WAL_HEADER_SIZE];
        match read_exact_or_eof(&mut self.reader, &mut header_buf)? {
            ReadOutcome::Eof => return Ok(None),
            ReadOutcome::Partial => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "torn WAL header at tail",
                ));
            }
            ReadOutcome::Full => {}
        }

        let header = WalHeader::from_bytes(&header_buf);

        let mut payload = vec![0u8; header.payload_len as usize];
        self.reader.read_exact(&mut payload).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                io::Error::new(io::ErrorKind::UnexpectedEof, "torn WAL payload at tail")
            } else {
                e
            }
        })?;

        if !header.verify_checksum(&payload) {
            let seq_id = header.seq_id;
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "CRC32 checksum mismatch at seq_id={}, expected={}, got={}",
                    seq_id,
                    { header.checksum },
                    crc32_checksum(&payload)
                ),
            ));
        }

        self.bytes_consumed += (WAL_HEADER_SIZE + payload.len()) as u64;
        Ok(Some(WalRecord { header, payload }))
    }
}

enum ReadOutcome {
    Full,
    Partial,
    Eof,
}

/// read_exact that reports whether EOF fell on the buffer start (clean end)
/// or inside it (torn write).
fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<ReadOutcome> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Ok(if filled == 0 {
                    ReadOutcome::Eof
                } else {
                    ReadOutcome::Partial
                });
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(ReadOutcome::Full)
}

// ============================================================
// Unit Tests
// ============================================================
