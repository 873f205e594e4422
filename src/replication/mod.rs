//! Primary/backup replication
//!
//! - `wire`: length-prefixed, checksummed bincode frames
//! - `client`: primary-side RPC stub (apply-transaction, health ping)
//! - `server`: backup-side endpoint driving the local wallet engine

pub mod client;
pub mod server;
pub mod wire;

pub use client::{ReplicationClient, ReplicationError};
pub use server::ReplicationServer;
pub use wire::{RpcRequest, RpcResponse};
