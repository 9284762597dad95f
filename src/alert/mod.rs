//! AlertCoordinator - Alert Decision and Fan-Out
//!
//! ## Responsibilities
//!
//! - Drain the three kind queues in fixed priority order (face, motion,
//!   object)
//! - Validate events against the loaded camera configuration
//! - Rate-limit accepted alerts per (kind, camera) key
//! - Resolve evidence, persist alert records, append audit lines
//! - Fire-and-forget notification fan-out
//! - Coalesce face/object detection bursts into a single alert
//!
//! Per key the coordinator is a two-state machine: Idle until an event is
//! accepted, Triggered for the cooldown window that the accept starts,
//! then Idle again. Rate-limit state and queued events do not survive a
//! restart.

mod rate_limiter;
mod types;

pub use rate_limiter::{Clock, ManualClock, RateLimiter, SystemClock};
pub use types::{AlertRecord, AlertStatus};

use crate::alert_store::AlertStore;
use crate::audit_log::{AuditEntry, AuditLog};
use crate::config_store::CameraConfig;
use crate::detector::{DetectionEvent, DetectionKind};
use crate::event_queue::TypeQueues;
use crate::evidence::EvidenceStore;
use crate::frame_buffer::FrameBuffer;
use crate::notifier::NotificationSink;
use crate::stats::PipelineStats;
use crate::supervisor::ShutdownFlag;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

pub struct AlertCoordinator {
    cameras: Arc<Vec<CameraConfig>>,
    queues: Arc<TypeQueues>,
    rate_limiter: RateLimiter,
    buffers: Vec<Arc<FrameBuffer>>,
    evidence: Arc<EvidenceStore>,
    audit: Arc<AuditLog>,
    store: Arc<dyn AlertStore>,
    sinks: Vec<Arc<dyn NotificationSink>>,
    stats: Arc<PipelineStats>,
    idle_sleep: Duration,
    shutdown: ShutdownFlag,
}

impl AlertCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cameras: Arc<Vec<CameraConfig>>,
        queues: Arc<TypeQueues>,
        rate_limiter: RateLimiter,
        buffers: Vec<Arc<FrameBuffer>>,
        evidence: Arc<EvidenceStore>,
        audit: Arc<AuditLog>,
        store: Arc<dyn AlertStore>,
        sinks: Vec<Arc<dyn NotificationSink>>,
        stats: Arc<PipelineStats>,
        idle_sleep: Duration,
        shutdown: ShutdownFlag,
    ) -> Self {
        Self {
            cameras,
            queues,
            rate_limiter,
            buffers,
            evidence,
            audit,
            store,
            sinks,
            stats,
            idle_sleep,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            cameras = self.cameras.len(),
            sinks = self.sinks.len(),
            cooldown_secs = self.rate_limiter.cooldown().as_secs(),
            "Alert coordinator started"
        );

        loop {
            if self.shutdown.is_raised() {
                break;
            }
            let serviced = self.service_once().await;
            if serviced == 0 {
                sleep(self.idle_sleep).await;
            }
        }

        self.stats.record_worker_exit();
        tracing::info!("Alert coordinator stopped");
    }

    /// One pass over the queues in fixed priority order. At most one event
    /// per channel is dequeued, so a burst on one channel can never starve
    /// the others beyond a single event per pass. Returns the number of
    /// events dequeued.
    pub async fn service_once(&mut self) -> usize {
        let queues = self.queues.in_service_order().map(Arc::clone);

        let mut serviced = 0;
        for queue in queues {
            let Some(event) = queue.try_pop().await else {
                continue;
            };
            serviced += 1;
            self.handle_event(event).await;
        }
        serviced
    }

    async fn handle_event(&mut self, event: DetectionEvent) {
        // Stale or misrouted events are dropped without comment
        if !self.is_configured(&event) {
            self.stats.record_event_invalid();
            tracing::debug!(
                camera_id = event.camera_id,
                kind = %event.kind,
                "Dropping event for unknown camera or disabled detection type"
            );
            return;
        }

        let key = event.key();
        if !self.rate_limiter.is_allowed(key) {
            self.stats.record_event_rate_limited();
            tracing::debug!(
                camera_id = event.camera_id,
                kind = %event.kind,
                "Alert suppressed by cooldown"
            );
            return;
        }

        let evidence_path = self.resolve_evidence(&event).await;
        let record = AlertRecord::from_event(&event, evidence_path.clone());

        if let Err(e) = self
            .audit
            .append(AuditEntry {
                kind: event.kind,
                camera_id: event.camera_id,
                severity: event.severity,
                message: event.message.clone(),
                evidence: evidence_path.clone(),
                timestamp: record.time,
            })
            .await
        {
            tracing::warn!(error = %e, "Audit log append failed");
        }

        match self.store.persist(&record).await {
            Ok(alert_id) => {
                self.stats.record_alert_persisted();
                tracing::info!(
                    alert_id = alert_id,
                    camera_id = event.camera_id,
                    kind = %event.kind,
                    severity = %event.severity,
                    message = %event.message,
                    "Alert recorded"
                );
            }
            Err(e) => {
                self.stats.record_persistence_failure();
                tracing::error!(
                    camera_id = event.camera_id,
                    kind = %event.kind,
                    error = %e,
                    "Failed to persist alert"
                );
            }
        }

        self.dispatch_notifications(&event, evidence_path.as_deref())
            .await;

        self.rate_limiter.record(key);

        // Face and object bursts collapse into the alert just raised;
        // motion keeps its backlog.
        if event.kind != DetectionKind::Motion {
            let purged = self
                .queues
                .for_kind(event.kind)
                .purge_camera(event.camera_id)
                .await;
            if purged > 0 {
                self.stats.record_events_coalesced(purged);
                tracing::debug!(
                    camera_id = event.camera_id,
                    kind = %event.kind,
                    purged = purged,
                    "Coalesced detection burst"
                );
            }
        }
    }

    fn is_configured(&self, event: &DetectionEvent) -> bool {
        self.cameras
            .get(event.camera_id)
            .map(|camera| camera.detections.contains(&event.kind))
            .unwrap_or(false)
    }

    /// Use the evidence attached by the detector, or capture the camera's
    /// current frame on the spot. Either may fail; the alert goes out
    /// without an attachment in that case.
    async fn resolve_evidence(&self, event: &DetectionEvent) -> Option<PathBuf> {
        if let Some(path) = &event.evidence_path {
            return Some(path.clone());
        }

        let buffer = self.buffers.get(event.camera_id)?;
        let frame = buffer.snapshot().await?;
        match self
            .evidence
            .save(event.kind, event.camera_id, None, &frame, &[])
            .await
        {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(
                    camera_id = event.camera_id,
                    kind = %event.kind,
                    error = %e,
                    "Fresh evidence capture failed"
                );
                None
            }
        }
    }

    /// Each sink is invoked independently; a failure is logged and never
    /// affects the other sinks or the loop.
    async fn dispatch_notifications(
        &self,
        event: &DetectionEvent,
        attachment: Option<&std::path::Path>,
    ) {
        let subject = event.kind.subject();
        for sink in &self.sinks {
            if let Err(e) = sink.notify(subject, &event.message, attachment).await {
                self.stats.record_notification_failure();
                tracing::warn!(
                    sink = sink.name(),
                    camera_id = event.camera_id,
                    error = %e,
                    "Notification failed"
                );
            }
        }
    }
}
