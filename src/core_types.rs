//! Core types used throughout the system
//!
//! These are fundamental type aliases used by all modules.
//! They provide semantic meaning and enable future type evolution.

/// Account ID - opaque, non-empty, client-chosen string.
///
/// # Constraints:
/// - **Immutable**: An account is never renamed or deleted
/// - **Lazily created**: The first committed deposit creates the account
pub type AccountId = String;

/// Transaction ID - opaque, non-empty, client-chosen string.
///
/// Expected to be globally unique per client. The ledger keys on it for
/// idempotency: a reused ID replays the original outcome instead of
/// applying a second balance effect.
pub type TransactionId = String;

/// Sequence number for WAL ordering
pub type SeqNum = u64;
