//! ftwallet - fault-tolerant account-balance service
//!
//! Two peer processes run the same wallet engine; one is primary, one is
//! backup. Every mutation replicates to the backup before the primary
//! applies it locally, each engine is idempotent on a client-supplied
//! transaction id, and a write-ahead ledger makes every operation
//! crash-safe.
//!
//! # Modules
//!
//! - [`core_types`] - Core type aliases (AccountId, TransactionId, ...)
//! - [`money`] - Scaled integer amounts with f64 boundary conversion
//! - [`models`] - Transaction records, kinds, statuses, replies
//! - [`wal`] - Binary WAL format (header + CRC32 framing)
//! - [`ledger_wal`] - Ledger WAL, balance snapshots, recovery
//! - [`engine`] - The wallet engine (balances + ledger + WAL)
//! - [`replication`] - Primary/backup RPC (wire, client, server)
//! - [`failover`] - Failover mode flag + backup health monitor
//! - [`primary`] - Primary orchestrator (replicate-first protocol)
//! - [`gateway`] - HTTP edge (axum)
//! - [`config`] - Configuration loading and validation
//! - [`logging`] - tracing subscriber setup

// Core types - must be first!
pub mod core_types;

// Configuration
pub mod config;
pub mod logging;

// Wallet engine and persistence
pub mod engine;
pub mod ledger_wal;
pub mod models;
pub mod money;
pub mod wal;

// Replication and orchestration
pub mod failover;
pub mod gateway;
pub mod primary;
pub mod replication;

// Convenient re-exports at crate root
pub use config::{AppConfig, Role};
pub use engine::{EngineError, WalletEngine};
pub use failover::FailoverState;
pub use models::{TransactionRecord, TxKind, TxReply, TxStatus};
pub use money::ScaledAmount;
pub use primary::PrimaryService;
pub use replication::{ReplicationClient, ReplicationError, ReplicationServer};
