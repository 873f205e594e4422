//! Replication server - drives a local wallet engine from peer RPCs
//!
//! On the backup this is the only way the engine is mutated; it never sees
//! HTTP traffic. The primary also runs one on its own RPC port so a future
//! failover ingress can reach it.

use crate::engine::{EngineError, WalletEngine};
use crate::models::TxKind;
use crate::replication::wire::{RpcRequest, RpcResponse, read_frame, write_frame};
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, TcpStream};

/// Accept loop over a bound listener; one task per peer connection.
pub struct ReplicationServer {
    engine: Arc<Mutex<WalletEngine>>,
}

impl ReplicationServer {
    pub fn new(engine: Arc<Mutex<WalletEngine>>) -> Self {
        Self { engine }
    }

    pub async fn run(self, listener: TcpListener) -> io::Result<()> {
        let local = listener.local_addr()?;
        tracing::info!(addr = %local, "Replication server listening");

        loop {
            let (stream, peer) = listener.accept().await?;
            tracing::debug!(%peer, "Replica connection accepted");
            let engine = self.engine.clone();
            tokio::spawn(async move {
                handle_connection(stream, engine, peer).await;
            });
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    engine: Arc<Mutex<WalletEngine>>,
    peer: SocketAddr,
) {
    loop {
        let request: RpcRequest = match read_frame(&mut stream).await {
            Ok(Some(request)) => request,
            Ok(None) => {
                tracing::debug!(%peer, "Replica connection closed");
                return;
            }
            Err(e) => {
                tracing::warn!(%peer, error = %e, "Replica connection read failed");
                return;
            }
        };

        let response = match dispatch(&engine, request) {
            Ok(response) => response,
            Err(e) => {
                // An engine error here (durability, corruption) has no
                // verbatim record to return; closing the connection lets the
                // primary classify the round as UNREACHABLE and fail over.
                tracing::error!(%peer, error = %e, "Engine error on replicated apply");
                return;
            }
        };

        if let Err(e) = write_frame(&mut stream, &response).await {
            tracing::warn!(%peer, error = %e, "Replica connection write failed");
            return;
        }
    }
}

fn dispatch(
    engine: &Arc<Mutex<WalletEngine>>,
    request: RpcRequest,
) -> Result<RpcResponse, EngineError> {
    match request {
        RpcRequest::Apply {
            kind,
            account_id,
            amount,
            transaction_id,
        } => {
            let mut engine = engine.lock().unwrap_or_else(|e| e.into_inner());
            let reply = match kind {
                TxKind::Deposit => engine.deposit(&account_id, amount, &transaction_id)?,
                TxKind::Withdraw => engine.withdraw(&account_id, amount, &transaction_id)?,
            };
            tracing::info!(
                transaction_id = %reply.transaction_id,
                kind = ?kind,
                success = reply.success,
                "Applied replicated transaction"
            );
            Ok(RpcResponse::Apply(reply))
        }
        RpcRequest::GetBalance { account_id } => {
            let engine = engine.lock().unwrap_or_else(|e| e.into_inner());
            Ok(RpcResponse::Balance(engine.get_balance(&account_id)))
        }
        RpcRequest::Ping => Ok(RpcResponse::Pong),
    }
}

// ============================================================
// Unit Tests
// ============================================================
