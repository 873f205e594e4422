//! Failover manager
//!
//! A single process-wide mode flag: NORMAL (replicate to the backup) or
//! FAILOVER (bypass it). A background task probes the backup every health
//! interval; the orchestrator can also demote synchronously when a
//! replicate call fails, so the mode never stays stale for a full interval.
//!
//! The divergence alarm lives here too: once primary and backup disagree on
//! an outcome in NORMAL mode, the flag latches until an operator restarts
//! the process.

use crate::replication::ReplicationClient;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Shared failover mode + divergence alarm. Atomic reads only; no lock.
#[derive(Debug, Default)]
pub struct FailoverState {
    failover: AtomicBool,
    alarm: AtomicBool,
}

impl FailoverState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking mode read for the orchestrator.
    pub fn is_failover(&self) -> bool {
        self.failover.load(Ordering::Relaxed)
    }

    /// Record a successful probe; logs only the FAILOVER -> NORMAL edge.
    pub fn note_ping_ok(&self) {
        if self
            .failover
            .compare_exchange(true, false, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            tracing::info!("Backup reachable again, resuming NORMAL mode");
        }
    }

    /// Record a failed probe; logs only the NORMAL -> FAILOVER edge.
    pub fn note_ping_failed(&self, reason: &str) {
        if self
            .failover
            .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            tracing::warn!(reason, "Backup unreachable, entering FAILOVER mode");
        }
    }

    /// Synchronous demotion on a failed replicate call.
    pub fn demote(&self, reason: &str) {
        self.note_ping_failed(reason);
    }

    /// Latch the replication-divergence alarm.
    pub fn raise_alarm(&self) {
        self.alarm.store(true, Ordering::Relaxed);
    }

    pub fn alarm_raised(&self) -> bool {
        self.alarm.load(Ordering::Relaxed)
    }
}

/// Spawn the periodic backup liveness probe.
pub fn spawn_health_monitor(
    state: Arc<FailoverState>,
    client: ReplicationClient,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick fires immediately; skip it so startup order does not
        // race the backup coming up.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match client.ping().await {
                Ok(()) => {
                    tracing::debug!("Backup health probe ok");
                    state.note_ping_ok();
                }
                Err(e) => {
                    state.note_ping_failed(&e.to_string());
                }
            }
        }
    })
}

// ============================================================
// Unit Tests
// ============================================================
