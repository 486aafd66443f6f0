use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Debug, Serialize)]
pub struct WatchHealthReport {
    pub uptime_seconds: u64,
    pub poll_cycles: u64,
    pub notifications_sent: u64,
    pub delivery_failures: u64,
    pub last_cycle: Option<String>,
}

/// Runtime counters of the watcher. Cheap to clone, shared between the
/// poll task and the HTTP layer.
#[derive(Clone)]
pub struct WatchHealth {
    start_time: Instant,
    poll_cycles: Arc<AtomicU64>,
    notifications_sent: Arc<AtomicU64>,
    delivery_failures: Arc<AtomicU64>,
    last_cycle: Arc<Mutex<Option<OffsetDateTime>>>,
}

impl WatchHealth {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            poll_cycles: Arc::new(AtomicU64::new(0)),
            notifications_sent: Arc::new(AtomicU64::new(0)),
            delivery_failures: Arc::new(AtomicU64::new(0)),
            last_cycle: Arc::new(Mutex::new(None)),
        }
    }

    pub fn record_cycle(&self) {
        self.poll_cycles.fetch_add(1, Ordering::Relaxed);
        *self.last_cycle.lock() = Some(OffsetDateTime::now_utc());
    }

    pub fn record_notification(&self) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivery_failure(&self) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn report(&self) -> WatchHealthReport {
        let last_cycle = *self.last_cycle.lock();
        WatchHealthReport {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            poll_cycles: self.poll_cycles.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            last_cycle: last_cycle.and_then(|t| t.format(&Rfc3339).ok()),
        }
    }
}

impl Default for WatchHealth {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_shared_between_clones() {
        let health = WatchHealth::new();
        let poller_side = health.clone();
        poller_side.record_cycle();
        poller_side.record_cycle();
        poller_side.record_notification();
        poller_side.record_delivery_failure();

        let report = health.report();
        assert_eq!(report.poll_cycles, 2);
        assert_eq!(report.notifications_sent, 1);
        assert_eq!(report.delivery_failures, 1);
        assert!(report.last_cycle.is_some());
    }

    #[test]
    fn fresh_tracker_has_no_cycle() {
        let report = WatchHealth::new().report();
        assert_eq!(report.poll_cycles, 0);
        assert!(report.last_cycle.is_none());
    }
}
