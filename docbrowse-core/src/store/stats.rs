use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

/// Dispatch counters for monitoring and debugging
#[derive(Debug, Default)]
pub struct StoreStats {
    dispatches: AtomicU64,
    in_flight_skips: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    abandoned: AtomicU64,
    total_load_time_ns: AtomicU64,
}

impl StoreStats {
    pub fn record_dispatch(&self) {
        self.dispatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_in_flight_skip(&self) {
        self.in_flight_skips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::Relaxed);
    }

    #[expect(clippy::cast_possible_truncation, reason = "Expected accuracy")]
    pub fn record_load(&self, duration: Duration, success: bool) {
        self.total_load_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);

        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StoreStatsSnapshot {
        let successes = self.successes.load(Ordering::Relaxed);
        let failures = self.failures.load(Ordering::Relaxed);
        let total_load_time_ns = self.total_load_time_ns.load(Ordering::Relaxed);
        let loads = successes + failures;

        StoreStatsSnapshot {
            dispatches: self.dispatches.load(Ordering::Relaxed),
            in_flight_skips: self.in_flight_skips.load(Ordering::Relaxed),
            successes,
            failures,
            abandoned: self.abandoned.load(Ordering::Relaxed),
            total_load_time: Duration::from_nanos(total_load_time_ns),
            average_load_time: if loads > 0 {
                Duration::from_nanos(total_load_time_ns / loads)
            } else {
                Duration::ZERO
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStatsSnapshot {
    pub dispatches: u64,
    pub in_flight_skips: u64,
    pub successes: u64,
    pub failures: u64,
    pub abandoned: u64,
    pub total_load_time: Duration,
    pub average_load_time: Duration,
}

impl StoreStatsSnapshot {
    #[must_use]
    pub const fn load_count(&self) -> u64 {
        self.successes + self.failures
    }

    #[expect(clippy::cast_precision_loss, reason = "Expected precision loss")]
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        let loads = self.load_count();
        if loads == 0 {
            0.0
        } else {
            self.failures as f64 / loads as f64
        }
    }
}
