//! Primary orchestrator - sync-first replication
//!
//! Every mutation replicates to the backup before the primary applies it
//! locally. Both engines are idempotent on `transaction_id`, so if the
//! primary dies between the two steps the backup already holds the
//! authoritative record and a client retry is answered consistently by
//! whichever replica serves it.
//!
//! The replication slot is held from before the backup RPC until the local
//! apply finishes, which serializes mutations and makes the persisted order
//! identical on both replicas in NORMAL mode. The engine lock itself is
//! never held across the RPC.

use crate::engine::{EngineError, WalletEngine};
use crate::failover::FailoverState;
use crate::models::{TxKind, TxReply};
use crate::money::ScaledAmount;
use crate::replication::ReplicationClient;
use std::sync::{Arc, Mutex};

pub struct PrimaryService {
    engine: Arc<Mutex<WalletEngine>>,
    backup: ReplicationClient,
    failover: Arc<FailoverState>,
    replication_slot: tokio::sync::Mutex<()>,
}

impl PrimaryService {
    pub fn new(
        engine: Arc<Mutex<WalletEngine>>,
        backup: ReplicationClient,
        failover: Arc<FailoverState>,
    ) -> Self {
        Self {
            engine,
            backup,
            failover,
            replication_slot: tokio::sync::Mutex::new(()),
        }
    }

    /// Execute one mutation: backup first, then local, then compare.
    pub async fn execute(
        &self,
        kind: TxKind,
        account_id: &str,
        amount: ScaledAmount,
        transaction_id: &str,
    ) -> Result<TxReply, EngineError> {
        let _slot = self.replication_slot.lock().await;

        let backup_reply = if self.failover.is_failover() {
            tracing::warn!(
                transaction_id = %transaction_id,
                "FAILOVER mode, skipping replication"
            );
            None
        } else {
            match self
                .backup
                .replicate(kind, account_id, amount, transaction_id)
                .await
            {
                Ok(reply) => Some(reply),
                Err(e) => {
                    tracing::warn!(
                        transaction_id = %transaction_id,
                        error = %e,
                        "Replication failed, continuing locally"
                    );
                    self.failover.demote(&e.to_string());
                    None
                }
            }
        };

        let primary_reply = {
            let mut engine = self.engine.lock().unwrap_or_else(|e| e.into_inner());
            match kind {
                TxKind::Deposit => engine.deposit(account_id, amount, transaction_id)?,
                TxKind::Withdraw => engine.withdraw(account_id, amount, transaction_id)?,
            }
        };

        if let Some(backup_reply) = backup_reply {
            self.check_divergence(&primary_reply, &backup_reply);
        }

        Ok(primary_reply)
    }

    /// Reads bypass replication entirely.
    pub fn get_balance(&self, account_id: &str) -> ScaledAmount {
        let engine = self.engine.lock().unwrap_or_else(|e| e.into_inner());
        engine.get_balance(account_id)
    }

    /// Success flags must match, and successful mutations must land on the
    /// same balance. A mismatch is an invariant violation: both records are
    /// logged and the health alarm latches, but the client still gets the
    /// primary's record.
    fn check_divergence(&self, primary: &TxReply, backup: &TxReply) {
        let balances_match = !primary.success || primary.new_balance == backup.new_balance;
        if primary.success == backup.success && balances_match {
            return;
        }
        tracing::error!(
            transaction_id = %primary.transaction_id,
            primary_reply = ?primary,
            backup_reply = ?backup,
            "REPLICATION DIVERGENCE: primary and backup disagree"
        );
        self.failover.raise_alarm();
    }
}

// ============================================================
// Unit Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn amt(value: f64) -> ScaledAmount {
        ScaledAmount::from_f64(value).unwrap()
    }

    fn open_engine(dir: &str) -> Arc<Mutex<WalletEngine>> {
        let _ = std::fs::remove_dir_all(dir);
        let mut engine = WalletEngine::open(dir).unwrap();
        engine.recover().unwrap();
        Arc::new(Mutex::new(engine))
    }

    fn dead_backup_client() -> (ReplicationClient, std::net::SocketAddr) {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        (
            ReplicationClient::new(
                addr.to_string(),
                Duration::from_millis(200),
                Duration::from_millis(100),
            ),
            addr,
        )
    }

    // --------------------------------------------------------
    // Test 1: Dead backup demotes to FAILOVER and applies locally
    // --------------------------------------------------------
    #[tokio::test]
    async fn test_dead_backup_fails_over() {
        let dir = format!("target/test_primary_failover_{}", std::process::id());
        let engine = open_engine(&dir);
        let (client, _) = dead_backup_client();
        let failover = Arc::new(FailoverState::new());
        let primary = PrimaryService::new(engine, client, failover.clone());

        assert!(!failover.is_failover());
        let reply = primary
            .execute(TxKind::Deposit, "u", amt(10.0), "t5")
            .await
            .unwrap();

        assert!(reply.success);
        assert_eq!(reply.new_balance, Some(amt(10.0)));
        assert!(failover.is_failover());
        assert_eq!(primary.get_balance("u"), amt(10.0));

        let _ = std::fs::remove_dir_all(&dir);
    }

    // --------------------------------------------------------
    // Test 2: In FAILOVER, replication is skipped outright
    // --------------------------------------------------------
    #[tokio::test]
    async fn test_failover_skips_replication() {
        let dir = format!("target/test_primary_skip_{}", std::process::id());
        let engine = open_engine(&dir);
        let (client, _) = dead_backup_client();
        let failover = Arc::new(FailoverState::new());
        failover.demote("test setup");
        let primary = PrimaryService::new(engine, client, failover.clone());

        // With a dead backup this would take the 200ms timeout; in FAILOVER
        // it returns straight from the local engine.
        let reply = primary
            .execute(TxKind::Deposit, "u", amt(1.0), "t1")
            .await
            .unwrap();
        assert!(reply.success);
        assert!(!failover.alarm_raised());

        let _ = std::fs::remove_dir_all(&dir);
    }

    // --------------------------------------------------------
    // Test 3: Divergence check flags mismatched outcomes only
    // --------------------------------------------------------
    #[tokio::test]
    async fn test_divergence_check() {
        let dir = format!("target/test_primary_diverge_{}", std::process::id());
        let engine = open_engine(&dir);
        let (client, _) = dead_backup_client();
        let failover = Arc::new(FailoverState::new());
        let primary = PrimaryService::new(engine, client, failover.clone());

        let reply = |success: bool, balance: Option<f64>| TxReply {
            transaction_id: "t1".to_string(),
            success,
            new_balance: balance.map(|b| amt(b)),
            message: String::new(),
        };

        // Matching success + balance: no alarm
        primary.check_divergence(&reply(true, Some(10.0)), &reply(true, Some(10.0)));
        assert!(!failover.alarm_raised());

        // Matching failure: no alarm, balances irrelevant
        primary.check_divergence(&reply(false, None), &reply(false, None));
        assert!(!failover.alarm_raised());

        // Success flags disagree: alarm
        primary.check_divergence(&reply(true, Some(10.0)), &reply(false, None));
        assert!(failover.alarm_raised());

        let _ = std::fs::remove_dir_all(&dir);
    }

    // --------------------------------------------------------
    // Test 4: Balance mismatch on success raises the alarm
    // --------------------------------------------------------
    #[tokio::test]
    async fn test_divergent_balance_raises_alarm() {
        let dir = format!("target/test_primary_diverge_bal_{}", std::process::id());
        let engine = open_engine(&dir);
        let (client, _) = dead_backup_client();
        let failover = Arc::new(FailoverState::new());
        let primary = PrimaryService::new(engine, client, failover.clone());

        let a = TxReply {
            transaction_id: "t1".to_string(),
            success: true,
            new_balance: Some(amt(10.0)),
            message: String::new(),
        };
        let b = TxReply {
            new_balance: Some(amt(15.0)),
            ..a.clone()
        };
        primary.check_divergence(&a, &b);
        assert!(failover.alarm_raised());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
