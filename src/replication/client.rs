//! Replication client - primary-side RPC stub
//!
//! One connection per call keeps the failure surface flat: any transport
//! error, timeout, or malformed frame is UNREACHABLE and feeds the failover
//! manager. A decoded reply, including a business failure such as
//! insufficient balance, is a successful replication round-trip.

use crate::models::{TxKind, TxReply};
use crate::money::ScaledAmount;
use crate::replication::wire::{RpcRequest, RpcResponse, read_frame, write_frame};
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;

#[derive(Debug, Error)]
pub enum ReplicationError {
    #[error("backup unreachable: {0}")]
    Unreachable(io::Error),

    #[error("replication call timed out after {0:?}")]
    Timeout(Duration),

    #[error("protocol violation: {0}")]
    Protocol(String),
}

/// RPC stub to the peer replica.
#[derive(Debug, Clone)]
pub struct ReplicationClient {
    addr: String,
    replicate_timeout: Duration,
    ping_timeout: Duration,
}

impl ReplicationClient {
    pub fn new(
        addr: impl Into<String>,
        replicate_timeout: Duration,
        ping_timeout: Duration,
    ) -> Self {
        Self {
            addr: addr.into(),
            replicate_timeout,
            ping_timeout,
        }
    }

    /// Apply a transaction on the peer and return its record.
    pub async fn replicate(
        &self,
        kind: TxKind,
        account_id: &str,
        amount: ScaledAmount,
        transaction_id: &str,
    ) -> Result<TxReply, ReplicationError> {
        let request = RpcRequest::Apply {
            kind,
            account_id: account_id.to_string(),
            amount,
            transaction_id: transaction_id.to_string(),
        };
        match self.call(request, self.replicate_timeout).await? {
            RpcResponse::Apply(reply) => Ok(reply),
            other => Err(ReplicationError::Protocol(format!(
                "unexpected reply to Apply: {:?}",
                other
            ))),
        }
    }

    /// Liveness probe with the shorter timeout.
    pub async fn ping(&self) -> Result<(), ReplicationError> {
        match self.call(RpcRequest::Ping, self.ping_timeout).await? {
            RpcResponse::Pong => Ok(()),
            other => Err(ReplicationError::Protocol(format!(
                "unexpected reply to Ping: {:?}",
                other
            ))),
        }
    }

    /// Read a balance from the peer (inspection, not on the client path).
    pub async fn get_balance(&self, account_id: &str) -> Result<ScaledAmount, ReplicationError> {
        let request = RpcRequest::GetBalance {
            account_id: account_id.to_string(),
        };
        match self.call(request, self.replicate_timeout).await? {
            RpcResponse::Balance(balance) => Ok(balance),
            other => Err(ReplicationError::Protocol(format!(
                "unexpected reply to GetBalance: {:?}",
                other
            ))),
        }
    }

    async fn call(
        &self,
        request: RpcRequest,
        timeout: Duration,
    ) -> Result<RpcResponse, ReplicationError> {
        let round_trip = async {
            let mut stream = TcpStream::connect(&self.addr).await?;
            write_frame(&mut stream, &request).await?;
            match read_frame(&mut stream).await? {
                Some(response) => Ok(response),
                None => Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed before reply",
                )),
            }
        };

        match tokio::time::timeout(timeout, round_trip).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) if e.kind() == io::ErrorKind::InvalidData => {
                Err(ReplicationError::Protocol(e.to_string()))
            }
            Ok(Err(e)) => Err(ReplicationError::Unreachable(e)),
            Err(_) => Err(ReplicationError::Timeout(timeout)),
        }
    }
}

// ============================================================
// Unit Tests
// ============================================================
