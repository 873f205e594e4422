//! Replication wire format
//!
//! Length-prefixed request/reply frames over a byte stream:
//!
//! ```text
//! ┌────────────┬───────────┬────────────────────────────────────┐
//! │ payload_len│ 4 bytes   │ bincode body size (max 64KB)       │
//! │ checksum   │ 4 bytes   │ CRC32 of body                      │
//! │ body       │ variable  │ bincode RpcRequest / RpcResponse   │
//! └────────────┴───────────┴────────────────────────────────────┘
//! ```
//!
//! Strings travel as UTF-8, amounts as micro-unit integers. The checksum
//! rejects a desynchronized or truncated peer before bincode sees the bytes.

use crate::core_types::{AccountId, TransactionId};
use crate::models::{TxKind, TxReply};
use crate::money::ScaledAmount;
use crate::wal::crc32_checksum;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Frame header: payload_len (u32 LE) + checksum (u32 LE)
pub const FRAME_HEADER_SIZE: usize = 8;

/// Upper bound on a frame body; anything larger is a protocol violation
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Requests the primary sends to the backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcRequest {
    Apply {
        kind: TxKind,
        account_id: AccountId,
        amount: ScaledAmount,
        transaction_id: TransactionId,
    },
    GetBalance {
        account_id: AccountId,
    },
    Ping,
}

/// Replies from the backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcResponse {
    Apply(TxReply),
    Balance(ScaledAmount),
    Pong,
}

/// Write one frame.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body =
        bincode::serialize(message).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if body.len() > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame body too large: {} bytes", body.len()),
        ));
    }

    let mut header = [0u8; FRAME_HEADER_SIZE];
    header[0..4].copy_from_slice(&(body.len() as u32).to_le_bytes());
    header[4..8].copy_from_slice(&crc32_checksum(&body).to_le_bytes());

    writer.write_all(&header).await?;
    writer.write_all(&body).await?;
    writer.flush().await
}

/// Read one frame.
///
/// `Ok(None)` when the peer closed the connection on a frame boundary.
pub async fn read_frame<R, T>(reader: &mut R) -> io::Result<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut header = [0u8; FRAME_HEADER_SIZE];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let checksum = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame body too large: {} bytes", len),
        ));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;

    if crc32_checksum(&body) != checksum {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "frame checksum mismatch",
        ));
    }

    let message =
        bincode::deserialize(&body).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(Some(message))
}

// ============================================================
// Unit Tests
// ============================================================
