//! Per-source snapshot state
//!
//! Each snapshot is an immutable value swapped whole under a short write
//! lock, so readers always see a complete observation/error pair.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fairprice_core::{FeedError, Observation};

/// Latest observation and latest error retained from one source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceSnapshot {
    pub observation: Option<Observation>,
    pub last_error: Option<FeedError>,
    /// The last error arrived after the last observation
    pub error_pending: bool,
}

impl SourceSnapshot {
    /// Observation eligible for aggregation, if the source is not in error
    pub fn usable_observation(&self) -> Option<&Observation> {
        if self.error_pending {
            return None;
        }
        self.observation.as_ref()
    }
}

/// Shared state of one source, written by its worker and read by the aggregator
#[derive(Debug, Default)]
pub struct SourceState {
    snapshot: RwLock<Arc<SourceSnapshot>>,
    observations: AtomicU64,
    errors: AtomicU64,
    subscriptions: AtomicU64,
}

impl SourceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the observation; the last error stays recorded
    pub fn set_price(&self, observation: Observation) {
        let mut guard = self.snapshot.write();
        *guard = Arc::new(SourceSnapshot {
            observation: Some(observation),
            last_error: guard.last_error.clone(),
            error_pending: false,
        });
        drop(guard);

        self.observations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_error(&self, error: FeedError) {
        let mut guard = self.snapshot.write();
        *guard = Arc::new(SourceSnapshot {
            observation: guard.observation.clone(),
            last_error: Some(error),
            error_pending: true,
        });
        drop(guard);

        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_subscription(&self) {
        self.subscriptions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Arc<SourceSnapshot> {
        self.snapshot.read().clone()
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            observations: self.observations.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            subscriptions: self.subscriptions.load(Ordering::Relaxed),
        }
    }
}

/// Counters for one source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub observations: u64,
    pub errors: u64,
    pub subscriptions: u64,
}
