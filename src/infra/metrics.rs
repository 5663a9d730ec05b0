//! Metrics provider adapters.

use parking_lot::RwLock;

use crate::core::{MetricsProvider, SchedulerError, SystemSnapshot};
use crate::util::clock::utc_now;

/// Provider returning a caller-maintained snapshot.
///
/// Embedders that already sample the machine elsewhere push readings in with
/// [`StaticMetrics::set`]; each `snapshot()` call returns the latest one,
/// re-stamped with the current time.
pub struct StaticMetrics {
    current: RwLock<SystemSnapshot>,
}

impl StaticMetrics {
    /// Create a provider seeded with `snapshot`.
    pub const fn new(snapshot: SystemSnapshot) -> Self {
        Self {
            current: RwLock::new(snapshot),
        }
    }

    /// Replace the current reading.
    pub fn set(&self, snapshot: SystemSnapshot) {
        *self.current.write() = snapshot;
    }

    /// Modify the current reading in place.
    pub fn update(&self, f: impl FnOnce(&mut SystemSnapshot)) {
        f(&mut self.current.write());
    }
}

impl MetricsProvider for StaticMetrics {
    fn snapshot(&self) -> Result<SystemSnapshot, SchedulerError> {
        let mut snap = self.current.read().clone();
        snap.taken_at = utc_now();
        Ok(snap)
    }
}
