//! Detector worker harness
//!
//! One worker runs one capability against one camera: poll the camera's
//! frame slot, copy, evaluate, capture evidence, enqueue. Capability
//! failures are logged per iteration and never terminate the worker.

use super::{Detection, DetectionEvent, Detector};
use crate::error::Result;
use crate::event_queue::EventQueue;
use crate::evidence::EvidenceStore;
use crate::frame_buffer::{Frame, FrameBuffer};
use crate::stats::PipelineStats;
use crate::supervisor::ShutdownFlag;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

pub struct DetectorWorker {
    camera_id: usize,
    buffer: Arc<FrameBuffer>,
    detector: Box<dyn Detector>,
    queue: Arc<EventQueue>,
    evidence: Arc<EvidenceStore>,
    stats: Arc<PipelineStats>,
    poll_interval: Duration,
    shutdown: ShutdownFlag,
}

impl DetectorWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        camera_id: usize,
        buffer: Arc<FrameBuffer>,
        detector: Box<dyn Detector>,
        queue: Arc<EventQueue>,
        evidence: Arc<EvidenceStore>,
        stats: Arc<PipelineStats>,
        poll_interval: Duration,
        shutdown: ShutdownFlag,
    ) -> Self {
        Self {
            camera_id,
            buffer,
            detector,
            queue,
            evidence,
            stats,
            poll_interval,
            shutdown,
        }
    }

    /// Poll-and-evaluate loop. Never blocks waiting for a fresh frame:
    /// a stale copy degrades detection quality but cannot stall the
    /// pipeline.
    pub async fn run(mut self) {
        let kind = self.detector.kind();
        tracing::info!(
            camera_id = self.camera_id,
            kind = %kind,
            slot = self.buffer.name(),
            "Detector worker started"
        );

        loop {
            sleep(self.poll_interval).await;
            if self.shutdown.is_raised() {
                break;
            }

            let Some(frame) = self.buffer.snapshot().await else {
                continue;
            };
            if !frame.matches_shape(self.buffer.shape()) {
                tracing::warn!(
                    camera_id = self.camera_id,
                    kind = %kind,
                    "Skipping frame copy with unexpected shape"
                );
                continue;
            }

            match self.detector.evaluate(&frame) {
                Ok(Some(detection)) => self.emit(detection, frame).await,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        camera_id = self.camera_id,
                        kind = %kind,
                        error = %e,
                        "Detection stage failed, continuing"
                    );
                }
            }
        }

        self.stats.record_worker_exit();
        tracing::info!(
            camera_id = self.camera_id,
            kind = %kind,
            "Detector worker stopped"
        );
    }

    async fn emit(&mut self, detection: Detection, frame: Frame) {
        let kind = self.detector.kind();
        let evidence_path = self.capture_evidence(&detection, &frame).await;

        let event = DetectionEvent {
            camera_id: self.camera_id,
            kind,
            severity: detection.severity,
            message: detection.message,
            details: detection.details,
            evidence_path,
            captured_at: frame.captured_at,
        };

        tracing::debug!(
            camera_id = self.camera_id,
            kind = %kind,
            message = %event.message,
            "Detection event emitted"
        );
        self.queue.push(event).await;
        self.stats.record_event_emitted();
    }

    /// Evidence is captured before the event is enqueued. A storage
    /// failure degrades the event to no attachment rather than dropping
    /// it.
    async fn capture_evidence(&mut self, detection: &Detection, frame: &Frame) -> Option<PathBuf> {
        let result: Result<PathBuf> = self
            .evidence
            .save(
                self.detector.kind(),
                self.camera_id,
                detection.evidence_label.as_deref(),
                frame,
                &detection.details.bounding_boxes(),
            )
            .await;

        match result {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(
                    camera_id = self.camera_id,
                    kind = %self.detector.kind(),
                    error = %e,
                    "Evidence capture failed, emitting event without attachment"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{DetectionDetails, DetectionKind, Severity};
    use crate::error::Error;
    use crate::frame_buffer::FrameShape;

    const SHAPE: FrameShape = FrameShape::new(8, 8, 3);

    /// Emits on every frame until stopped
    struct AlwaysFires;

    impl Detector for AlwaysFires {
        fn kind(&self) -> DetectionKind {
            DetectionKind::Motion
        }

        fn evaluate(&mut self, _frame: &Frame) -> Result<Option<Detection>> {
            Ok(Some(Detection {
                severity: Severity::Medium,
                message: "Motion detected with score 42".to_string(),
                details: DetectionDetails::Motion {
                    foreground_pixels: 42,
                },
                evidence_label: None,
            }))
        }
    }

    /// Fails on every frame
    struct AlwaysFails;

    impl Detector for AlwaysFails {
        fn kind(&self) -> DetectionKind {
            DetectionKind::Motion
        }

        fn evaluate(&mut self, _frame: &Frame) -> Result<Option<Detection>> {
            Err(Error::Inference("broken stage".into()))
        }
    }

    fn worker_parts() -> (
        Arc<FrameBuffer>,
        Arc<EventQueue>,
        Arc<EvidenceStore>,
        Arc<PipelineStats>,
        ShutdownFlag,
        tempfile::TempDir,
    ) {
        let dir = tempfile::tempdir().unwrap();
        (
            Arc::new(FrameBuffer::new(0, SHAPE)),
            Arc::new(EventQueue::new(DetectionKind::Motion, 16)),
            Arc::new(EvidenceStore::new(dir.path())),
            Arc::new(PipelineStats::new()),
            ShutdownFlag::new(),
            dir,
        )
    }

    #[tokio::test]
    async fn test_events_carry_evidence_and_reach_queue() {
        let (buffer, queue, evidence, stats, shutdown, _dir) = worker_parts();
        buffer.store(Frame::filled(SHAPE, 50)).await.unwrap();

        let worker = DetectorWorker::new(
            0,
            buffer,
            Box::new(AlwaysFires),
            queue.clone(),
            evidence,
            stats.clone(),
            Duration::from_millis(1),
            shutdown.clone(),
        );
        let handle = tokio::spawn(worker.run());

        // Let a few iterations run, then stop
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.raise();
        handle.await.unwrap();

        let event = queue.try_pop().await.expect("worker should have emitted");
        assert_eq!(event.camera_id, 0);
        assert_eq!(event.kind, DetectionKind::Motion);
        assert_eq!(event.message, "Motion detected with score 42");
        let path = event.evidence_path.expect("evidence should be attached");
        assert!(path.exists());
        assert!(stats.snapshot().events_emitted >= 1);
        assert_eq!(stats.snapshot().worker_exits, 1);
    }

    #[tokio::test]
    async fn test_capability_failure_does_not_kill_worker() {
        let (buffer, queue, evidence, stats, shutdown, _dir) = worker_parts();
        buffer.store(Frame::filled(SHAPE, 50)).await.unwrap();

        let worker = DetectorWorker::new(
            0,
            buffer,
            Box::new(AlwaysFails),
            queue.clone(),
            evidence,
            stats,
            Duration::from_millis(1),
            shutdown.clone(),
        );
        let handle = tokio::spawn(worker.run());

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!handle.is_finished(), "worker must outlive stage failures");
        shutdown.raise();
        handle.await.unwrap();
        assert!(queue.try_pop().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_buffer_emits_nothing() {
        let (buffer, queue, evidence, stats, shutdown, _dir) = worker_parts();

        let worker = DetectorWorker::new(
            0,
            buffer,
            Box::new(AlwaysFires),
            queue.clone(),
            evidence,
            stats,
            Duration::from_millis(1),
            shutdown.clone(),
        );
        let handle = tokio::spawn(worker.run());

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.raise();
        handle.await.unwrap();
        assert!(queue.try_pop().await.is_none());
    }
}
