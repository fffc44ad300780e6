//! Metrics collection for the forwarder.
//!
//! Lightweight atomic counters shared between the forwarding and
//! computation layers.

use std::sync::atomic::{AtomicU64, Ordering};

/* ---------------------------------------------------------------- *
 * Simple Counter
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

/* ---------------------------------------------------------------- *
 * Gauge
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/* ---------------------------------------------------------------- *
 * Forwarder metrics registry
 * ---------------------------------------------------------------- */

/// Counters maintained by the ICN and NFN layers.
#[derive(Debug, Default)]
pub struct ForwarderMetrics {
    pub interests_received: Counter,
    pub contents_received: Counter,
    pub nacks_received: Counter,
    pub interests_forwarded: Counter,
    pub contents_sent: Counter,
    pub nacks_sent: Counter,
    pub cs_hits: Counter,
    pub cs_misses: Counter,
    pub no_route: Counter,
    pub pit_expired: Counter,
    pub pending_interests: Gauge,
    pub computations_spawned: Counter,
    pub computations_completed: Counter,
    pub computations_failed: Counter,
}

impl ForwarderMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_and_gauge() {
        let counter = Counter::new();
        counter.increment();
        counter.add(2);
        assert_eq!(counter.value(), 3);
        counter.reset();
        assert_eq!(counter.value(), 0);

        let gauge = Gauge::new();
        gauge.set(5);
        gauge.increment();
        gauge.decrement();
        assert_eq!(gauge.value(), 5);
    }
}
