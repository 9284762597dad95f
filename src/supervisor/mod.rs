//! ProcessSupervisor - Pipeline Lifecycle
//!
//! ## Responsibilities
//!
//! - Allocate one frame buffer per camera before any dependent worker
//! - Launch one frame source per camera, one detector worker per
//!   (camera, enabled kind), and exactly one alert coordinator
//! - Cooperative shutdown and ordered teardown: every worker terminates
//!   before the buffer pool is released
//!
//! Workers that exit unexpectedly are logged but not restarted.

use crate::alert::{AlertCoordinator, RateLimiter};
use crate::alert_store::AlertStore;
use crate::audit_log::AuditLog;
use crate::capture::{CameraFrameSource, CaptureBackend};
use crate::config_store::{CameraConfig, PipelineSettings};
use crate::detector::{
    DetectionKind, Detector, DetectorWorker, FaceDetector, FaceGallery, MotionDetector,
    ObjectDetector, StubFaceEncoder, StubObjectModel,
};
use crate::error::{Error, Result};
use crate::event_queue::TypeQueues;
use crate::evidence::EvidenceStore;
use crate::frame_buffer::FrameBuffer;
use crate::notifier::NotificationSink;
use crate::stats::PipelineStats;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Cooperative stop signal checked by every worker loop
#[derive(Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Builds one detection capability per (camera, kind)
pub trait DetectorFactory: Send + Sync {
    fn create(&self, kind: DetectionKind, camera: &CameraConfig) -> Result<Box<dyn Detector>>;
}

/// Wires the built-in capabilities. Object and face stages fall back to
/// stub models until real ones are plugged in.
pub struct DefaultDetectorFactory {
    gallery: Arc<FaceGallery>,
}

impl DefaultDetectorFactory {
    pub fn new(gallery: Arc<FaceGallery>) -> Self {
        Self { gallery }
    }
}

impl DetectorFactory for DefaultDetectorFactory {
    fn create(&self, kind: DetectionKind, camera: &CameraConfig) -> Result<Box<dyn Detector>> {
        match kind {
            DetectionKind::Motion => {
                Ok(Box::new(MotionDetector::new(camera.motion_threshold)))
            }
            DetectionKind::Object => {
                tracing::info!(
                    camera_id = camera.id,
                    "Object stage wired with stub model (no detection will occur)"
                );
                Ok(Box::new(ObjectDetector::new(
                    Box::new(StubObjectModel),
                    camera.object_threshold,
                )))
            }
            DetectionKind::Face => Ok(Box::new(FaceDetector::new(
                Box::new(StubFaceEncoder),
                self.gallery.clone(),
            ))),
        }
    }
}

struct Worker {
    role: String,
    handle: JoinHandle<()>,
}

/// ProcessSupervisor instance
pub struct ProcessSupervisor {
    settings: PipelineSettings,
    cameras: Arc<Vec<CameraConfig>>,
    backend: Arc<dyn CaptureBackend>,
    factory: Arc<dyn DetectorFactory>,
    store: Arc<dyn AlertStore>,
    sinks: Vec<Arc<dyn NotificationSink>>,
    evidence: Arc<EvidenceStore>,
    audit: Arc<AuditLog>,
    stats: Arc<PipelineStats>,
}

impl ProcessSupervisor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: PipelineSettings,
        cameras: Arc<Vec<CameraConfig>>,
        backend: Arc<dyn CaptureBackend>,
        factory: Arc<dyn DetectorFactory>,
        store: Arc<dyn AlertStore>,
        sinks: Vec<Arc<dyn NotificationSink>>,
        evidence: Arc<EvidenceStore>,
        audit: Arc<AuditLog>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            settings,
            cameras,
            backend,
            factory,
            store,
            sinks,
            evidence,
            audit,
            stats,
        }
    }

    /// Allocate buffers and start the whole worker fleet. Any allocation
    /// or construction failure aborts the launch before a single worker
    /// has started.
    pub fn launch(&self) -> Result<PipelineHandle> {
        if self.settings.frame_shape.byte_len() == 0 {
            return Err(Error::Startup(format!(
                "frame shape {} has no pixels",
                self.settings.frame_shape
            )));
        }
        if self.cameras.is_empty() {
            tracing::warn!("No cameras configured, pipeline will only idle");
        }

        // Buffers exist before any worker that touches them
        let buffers: Vec<Arc<FrameBuffer>> = (0..self.cameras.len())
            .map(|index| Arc::new(FrameBuffer::new(index, self.settings.frame_shape)))
            .collect();

        // Build every capability up front so a factory failure cannot
        // leave a half-started fleet behind. Cameras are addressed by
        // their position in the configuration list.
        let mut detectors: Vec<(usize, Box<dyn Detector>)> = Vec::new();
        for (index, camera) in self.cameras.iter().enumerate() {
            for kind in camera.detections.iter().copied() {
                let detector = self.factory.create(kind, camera).map_err(|e| {
                    Error::Startup(format!(
                        "cannot build {kind} detector for camera {index}: {e}"
                    ))
                })?;
                detectors.push((index, detector));
            }
        }

        let queues = Arc::new(TypeQueues::new(self.settings.queue_capacity));
        let shutdown = ShutdownFlag::new();
        let mut workers = Vec::new();

        for (index, camera) in self.cameras.iter().enumerate() {
            let source = CameraFrameSource::new(
                camera.clone(),
                buffers[index].clone(),
                self.backend.clone(),
                self.settings.capture_interval,
                shutdown.clone(),
                self.stats.clone(),
            );
            workers.push(Worker {
                role: format!("capture-{index}"),
                handle: tokio::spawn(source.run()),
            });
        }

        for (camera_id, detector) in detectors {
            let kind = detector.kind();
            let worker = DetectorWorker::new(
                camera_id,
                buffers[camera_id].clone(),
                detector,
                queues.for_kind(kind).clone(),
                self.evidence.clone(),
                self.stats.clone(),
                self.settings.detector_poll_interval,
                shutdown.clone(),
            );
            workers.push(Worker {
                role: format!("{kind}-{camera_id}"),
                handle: tokio::spawn(worker.run()),
            });
        }

        let coordinator = AlertCoordinator::new(
            self.cameras.clone(),
            queues.clone(),
            RateLimiter::with_system_clock(self.settings.alert_cooldown),
            buffers.clone(),
            self.evidence.clone(),
            self.audit.clone(),
            self.store.clone(),
            self.sinks.clone(),
            self.stats.clone(),
            self.settings.coordinator_idle,
            shutdown.clone(),
        );
        workers.push(Worker {
            role: "alert-coordinator".to_string(),
            handle: tokio::spawn(coordinator.run()),
        });

        tracing::info!(
            cameras = self.cameras.len(),
            workers = workers.len(),
            frame_shape = %self.settings.frame_shape,
            queue_capacity = self.settings.queue_capacity,
            "Pipeline launched"
        );

        Ok(PipelineHandle {
            shutdown,
            workers,
            buffers,
            queues,
            stats: self.stats.clone(),
            grace: self.settings.shutdown_grace,
        })
    }
}

/// Running pipeline: the worker fleet plus everything that must outlive it
pub struct PipelineHandle {
    shutdown: ShutdownFlag,
    workers: Vec<Worker>,
    buffers: Vec<Arc<FrameBuffer>>,
    queues: Arc<TypeQueues>,
    stats: Arc<PipelineStats>,
    grace: std::time::Duration,
}

impl std::fmt::Debug for PipelineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineHandle")
            .field("workers", &self.workers.len())
            .field("buffers", &self.buffers.len())
            .field("grace", &self.grace)
            .finish_non_exhaustive()
    }
}

impl PipelineHandle {
    pub fn shutdown_flag(&self) -> ShutdownFlag {
        self.shutdown.clone()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn queues(&self) -> Arc<TypeQueues> {
        self.queues.clone()
    }

    pub fn buffers(&self) -> &[Arc<FrameBuffer>] {
        &self.buffers
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        self.stats.clone()
    }

    /// Request shutdown and wait for the fleet to stop
    pub async fn stop(mut self) {
        self.shutdown.raise();
        self.join_all().await;
    }

    /// Block until every worker has exited (typically after an external
    /// shutdown trigger), then tear down
    pub async fn wait(mut self) {
        self.join_all().await;
    }

    /// Join every worker. Once shutdown has been requested each straggler
    /// gets the grace period before being aborted. The buffer pool is
    /// released strictly after the last worker has terminated.
    async fn join_all(&mut self) {
        for worker in self.workers.drain(..) {
            let abort = worker.handle.abort_handle();
            let joined = if self.shutdown.is_raised() {
                tokio::time::timeout(self.grace, worker.handle).await
            } else {
                Ok(worker.handle.await)
            };
            match joined {
                Ok(Ok(())) => {
                    tracing::debug!(role = %worker.role, "Worker finished");
                }
                Ok(Err(e)) if e.is_panic() => {
                    tracing::error!(role = %worker.role, "Worker panicked");
                }
                Ok(Err(_)) => {}
                Err(_) => {
                    tracing::warn!(
                        role = %worker.role,
                        grace_secs = self.grace.as_secs(),
                        "Worker did not stop within grace period, aborting"
                    );
                    abort.abort();
                }
            }
        }

        // No worker can hold a buffer reference past this point
        self.buffers.clear();
        self.stats.log_summary();
        tracing::info!("Pipeline torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert_store::MemoryAlertStore;
    use crate::capture::SyntheticBackend;
    use std::collections::BTreeSet;
    use std::time::Duration;

    fn camera(id: usize, detections: &[DetectionKind]) -> CameraConfig {
        CameraConfig {
            id,
            source: "synthetic:sweep".to_string(),
            detections: BTreeSet::from_iter(detections.iter().copied()),
            object_threshold: 0.5,
            motion_threshold: 30,
        }
    }

    fn settings() -> PipelineSettings {
        PipelineSettings {
            capture_interval: Duration::from_millis(1),
            detector_poll_interval: Duration::from_millis(1),
            coordinator_idle: Duration::from_millis(1),
            shutdown_grace: Duration::from_secs(1),
            ..PipelineSettings::default()
        }
    }

    fn supervisor(
        settings: PipelineSettings,
        cameras: Vec<CameraConfig>,
        factory: Arc<dyn DetectorFactory>,
    ) -> (ProcessSupervisor, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = ProcessSupervisor::new(
            settings,
            Arc::new(cameras),
            Arc::new(SyntheticBackend),
            factory,
            Arc::new(MemoryAlertStore::new()),
            Vec::new(),
            Arc::new(EvidenceStore::new(dir.path())),
            Arc::new(AuditLog::new(64, None)),
            Arc::new(PipelineStats::new()),
        );
        (supervisor, dir)
    }

    fn default_factory() -> Arc<dyn DetectorFactory> {
        Arc::new(DefaultDetectorFactory::new(Arc::new(FaceGallery::empty())))
    }

    struct BrokenFactory;

    impl DetectorFactory for BrokenFactory {
        fn create(
            &self,
            _kind: DetectionKind,
            _camera: &CameraConfig,
        ) -> Result<Box<dyn Detector>> {
            Err(Error::Inference("no model available".into()))
        }
    }

    #[tokio::test]
    async fn test_launch_spawns_expected_fleet() {
        let cameras = vec![
            camera(0, &[DetectionKind::Motion, DetectionKind::Object]),
            camera(1, &[DetectionKind::Face]),
        ];
        let (supervisor, _dir) = supervisor(settings(), cameras, default_factory());

        let handle = supervisor.launch().unwrap();
        // 2 capture workers + 3 detector workers + 1 coordinator
        assert_eq!(handle.worker_count(), 6);
        assert_eq!(handle.buffers().len(), 2);
        assert_eq!(handle.buffers()[1].name(), "frame-slot-1");

        let stats = handle.stats();
        handle.stop().await;
        assert_eq!(stats.snapshot().worker_exits, 6);
    }

    #[tokio::test]
    async fn test_capture_workers_fill_buffers() {
        let cameras = vec![camera(0, &[DetectionKind::Motion])];
        let (supervisor, _dir) = supervisor(settings(), cameras, default_factory());

        let handle = supervisor.launch().unwrap();
        let buffer = handle.buffers()[0].clone();
        for _ in 0..100 {
            if buffer.snapshot().await.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert!(buffer.snapshot().await.is_some());
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_factory_failure_is_fatal_at_startup() {
        let cameras = vec![camera(0, &[DetectionKind::Object])];
        let (supervisor, _dir) = supervisor(settings(), cameras, Arc::new(BrokenFactory));

        match supervisor.launch() {
            Err(Error::Startup(message)) => {
                assert!(message.contains("camera 0"));
            }
            other => panic!("expected startup error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_zero_sized_shape_is_fatal() {
        let mut s = settings();
        s.frame_shape = crate::frame_buffer::FrameShape::new(0, 0, 3);
        let (supervisor, _dir) = supervisor(s, vec![camera(0, &[DetectionKind::Motion])], default_factory());
        assert!(matches!(supervisor.launch(), Err(Error::Startup(_))));
    }

    #[tokio::test]
    async fn test_failed_capture_source_does_not_stop_siblings() {
        let cameras = vec![
            camera(0, &[DetectionKind::Motion]),
            CameraConfig {
                id: 1,
                source: "rtsp://unsupported".to_string(),
                detections: BTreeSet::from([DetectionKind::Motion]),
                object_threshold: 0.5,
                motion_threshold: 30,
            },
        ];
        let (supervisor, _dir) = supervisor(settings(), cameras, default_factory());

        let handle = supervisor.launch().unwrap();
        let healthy = handle.buffers()[0].clone();
        let broken = handle.buffers()[1].clone();
        for _ in 0..100 {
            if healthy.snapshot().await.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert!(healthy.snapshot().await.is_some());
        assert!(broken.snapshot().await.is_none());
        handle.stop().await;
    }
}
