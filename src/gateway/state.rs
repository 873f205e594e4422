//! Gateway application state (shared)

use crate::primary::PrimaryService;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Clone)]
pub struct AppState {
    /// Orchestrator behind every mutating route
    pub primary: Arc<PrimaryService>,
    /// Set once recovery finished and the service accepts traffic
    ready: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(primary: Arc<PrimaryService>) -> Self {
        Self {
            primary,
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Relaxed);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }
}
