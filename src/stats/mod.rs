//! Pipeline statistics
//!
//! ## Responsibilities
//!
//! - In-process counters for frames, events, drops and side effects
//! - Cheap to update from any worker, readable at any time

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared pipeline counters
#[derive(Debug, Default)]
pub struct PipelineStats {
    frames_captured: AtomicU64,
    events_emitted: AtomicU64,
    events_invalid: AtomicU64,
    events_rate_limited: AtomicU64,
    events_coalesced: AtomicU64,
    alerts_persisted: AtomicU64,
    persistence_failures: AtomicU64,
    notification_failures: AtomicU64,
    worker_exits: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame_captured(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_emitted(&self) {
        self.events_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_invalid(&self) {
        self.events_invalid.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_rate_limited(&self) {
        self.events_rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_events_coalesced(&self, count: usize) {
        self.events_coalesced
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_alert_persisted(&self) {
        self.alerts_persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persistence_failure(&self) {
        self.persistence_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notification_failure(&self) {
        self.notification_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_worker_exit(&self) {
        self.worker_exits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
            events_invalid: self.events_invalid.load(Ordering::Relaxed),
            events_rate_limited: self.events_rate_limited.load(Ordering::Relaxed),
            events_coalesced: self.events_coalesced.load(Ordering::Relaxed),
            alerts_persisted: self.alerts_persisted.load(Ordering::Relaxed),
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
            notification_failures: self.notification_failures.load(Ordering::Relaxed),
            worker_exits: self.worker_exits.load(Ordering::Relaxed),
        }
    }

    pub fn log_summary(&self) {
        let snapshot = self.snapshot();
        tracing::info!(
            frames_captured = snapshot.frames_captured,
            events_emitted = snapshot.events_emitted,
            events_invalid = snapshot.events_invalid,
            events_rate_limited = snapshot.events_rate_limited,
            events_coalesced = snapshot.events_coalesced,
            alerts_persisted = snapshot.alerts_persisted,
            persistence_failures = snapshot.persistence_failures,
            notification_failures = snapshot.notification_failures,
            worker_exits = snapshot.worker_exits,
            "Pipeline statistics"
        );
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames_captured: u64,
    pub events_emitted: u64,
    pub events_invalid: u64,
    pub events_rate_limited: u64,
    pub events_coalesced: u64,
    pub alerts_persisted: u64,
    pub persistence_failures: u64,
    pub notification_failures: u64,
    pub worker_exits: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = PipelineStats::new();
        stats.record_frame_captured();
        stats.record_frame_captured();
        stats.record_event_emitted();
        stats.record_events_coalesced(4);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.frames_captured, 2);
        assert_eq!(snapshot.events_emitted, 1);
        assert_eq!(snapshot.events_coalesced, 4);
        assert_eq!(snapshot.alerts_persisted, 0);
    }
}
