//! Auto-relay counters.
//!
//! [`Counter`] is a relaxed atomic; [`AutoRelayMetrics`] groups the
//! counters the coordinator maintains and serializes as a flat map.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// A monotonically increasing counter backed by [`AtomicU64`].
#[derive(Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Counter").field(&self.get()).finish()
    }
}

impl Serialize for Counter {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.get().serialize(serializer)
    }
}

/// Counters for one coordinator.
#[derive(Debug, Default, Serialize)]
pub struct AutoRelayMetrics {
    /// Connect notifications skipped because the relay set was full.
    pub capacity_skips: Counter,
    /// Hop probes issued.
    pub probes_started: Counter,
    /// Probes answered with "can hop".
    pub probes_capable: Counter,
    /// Probes answered with "cannot hop".
    pub probes_not_capable: Counter,
    /// Probes that failed or timed out.
    pub probes_failed: Counter,
    /// Successful probes discarded because the peer disconnected meanwhile.
    pub stale_results: Counter,
    pub relays_added: Counter,
    pub relays_removed: Counter,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_increments() {
        let c = Counter::new();
        assert_eq!(c.get(), 0);
        c.inc();
        c.inc();
        assert_eq!(c.get(), 2);
    }

    #[test]
    fn metrics_serialize_flat() {
        let m = AutoRelayMetrics::default();
        m.probes_started.inc();
        m.relays_added.inc();
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["probes_started"], 1);
        assert_eq!(json["relays_added"], 1);
        assert_eq!(json["probes_failed"], 0);
    }
}
