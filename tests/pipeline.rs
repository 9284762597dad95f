//! End-to-end pipeline tests: synthetic capture, scripted detection
//! stages, in-memory persistence.

use async_trait::async_trait;
use camwatch::alert_store::MemoryAlertStore;
use camwatch::audit_log::AuditLog;
use camwatch::capture::SyntheticBackend;
use camwatch::config_store::{CameraConfig, PipelineSettings};
use camwatch::detector::{
    Detection, DetectionDetails, DetectionEvent, DetectionKind, Detector, Severity,
};
use camwatch::error::Result;
use camwatch::event_queue::TypeQueues;
use camwatch::evidence::EvidenceStore;
use camwatch::frame_buffer::Frame;
use camwatch::notifier::NotificationSink;
use camwatch::stats::PipelineStats;
use camwatch::supervisor::{DetectorFactory, PipelineHandle, ProcessSupervisor};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Capability that reports a detection on every frame
struct FireEveryFrame {
    kind: DetectionKind,
}

impl Detector for FireEveryFrame {
    fn kind(&self) -> DetectionKind {
        self.kind
    }

    fn evaluate(&mut self, _frame: &Frame) -> Result<Option<Detection>> {
        Ok(Some(Detection {
            severity: Severity::Medium,
            message: "Motion detected with score 777".to_string(),
            details: DetectionDetails::Motion {
                foreground_pixels: 777,
            },
            evidence_label: None,
        }))
    }
}

/// Capability that never reports anything
struct NeverFires {
    kind: DetectionKind,
}

impl Detector for NeverFires {
    fn kind(&self) -> DetectionKind {
        self.kind
    }

    fn evaluate(&mut self, _frame: &Frame) -> Result<Option<Detection>> {
        Ok(None)
    }
}

struct ScriptedFactory {
    fire: bool,
}

impl DetectorFactory for ScriptedFactory {
    fn create(&self, kind: DetectionKind, _camera: &CameraConfig) -> Result<Box<dyn Detector>> {
        if self.fire {
            Ok(Box::new(FireEveryFrame { kind }))
        } else {
            Ok(Box::new(NeverFires { kind }))
        }
    }
}

struct RecordingSink {
    calls: RwLock<Vec<String>>,
}

impl RecordingSink {
    fn new() -> Self {
        Self {
            calls: RwLock::new(Vec::new()),
        }
    }

    async fn count(&self) -> usize {
        self.calls.read().await.len()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn notify(
        &self,
        subject: &str,
        _message: &str,
        _attachment: Option<&std::path::Path>,
    ) -> Result<()> {
        self.calls.write().await.push(subject.to_string());
        Ok(())
    }
}

fn camera(id: usize, detections: &[DetectionKind]) -> CameraConfig {
    CameraConfig {
        id,
        source: "synthetic:sweep".to_string(),
        detections: BTreeSet::from_iter(detections.iter().copied()),
        object_threshold: 0.5,
        motion_threshold: 30,
    }
}

fn fast_settings() -> PipelineSettings {
    PipelineSettings {
        capture_interval: Duration::from_millis(2),
        detector_poll_interval: Duration::from_millis(2),
        coordinator_idle: Duration::from_millis(2),
        alert_cooldown: Duration::from_secs(60),
        shutdown_grace: Duration::from_secs(2),
        ..PipelineSettings::default()
    }
}

struct Pipeline {
    handle: PipelineHandle,
    store: Arc<MemoryAlertStore>,
    sink: Arc<RecordingSink>,
    audit: Arc<AuditLog>,
    _evidence_dir: tempfile::TempDir,
}

fn launch(cameras: Vec<CameraConfig>, fire: bool) -> Pipeline {
    let evidence_dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryAlertStore::new());
    let sink = Arc::new(RecordingSink::new());
    let audit = Arc::new(AuditLog::new(64, None));

    let supervisor = ProcessSupervisor::new(
        fast_settings(),
        Arc::new(cameras),
        Arc::new(SyntheticBackend),
        Arc::new(ScriptedFactory { fire }),
        store.clone(),
        vec![sink.clone() as Arc<dyn NotificationSink>],
        Arc::new(EvidenceStore::new(evidence_dir.path())),
        audit.clone(),
        Arc::new(PipelineStats::new()),
    );

    Pipeline {
        handle: supervisor.launch().unwrap(),
        store,
        sink,
        audit,
        _evidence_dir: evidence_dir,
    }
}

async fn wait_for<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..500 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within timeout");
}

fn motion_event(camera_id: usize) -> DetectionEvent {
    DetectionEvent {
        camera_id,
        kind: DetectionKind::Motion,
        severity: Severity::Medium,
        message: "Motion detected with score 100".to_string(),
        details: DetectionDetails::Motion {
            foreground_pixels: 100,
        },
        evidence_path: None,
        captured_at: Utc::now(),
    }
}

fn object_event(camera_id: usize) -> DetectionEvent {
    DetectionEvent {
        camera_id,
        kind: DetectionKind::Object,
        severity: Severity::High,
        message: "Object detected: person".to_string(),
        details: DetectionDetails::Objects {
            detections: Vec::new(),
            top_label: "person".to_string(),
        },
        evidence_path: None,
        captured_at: Utc::now(),
    }
}

fn face_event(camera_id: usize) -> DetectionEvent {
    DetectionEvent {
        camera_id,
        kind: DetectionKind::Face,
        severity: Severity::High,
        message: "Face detected: alice".to_string(),
        details: DetectionDetails::Face {
            name: "alice".to_string(),
            bounding_box: camwatch::detector::BoundingBox::new(0, 0, 4, 4),
        },
        evidence_path: None,
        captured_at: Utc::now(),
    }
}

#[tokio::test]
async fn capture_to_alert_flow_produces_one_cooled_down_alert() {
    let pipeline = launch(vec![camera(0, &[DetectionKind::Motion])], true);

    let store = pipeline.store.clone();
    wait_for(|| {
        let store = store.clone();
        async move { store.count().await >= 1 }
    })
    .await;

    // Detections keep firing every few milliseconds, but inside the
    // cooldown window only the first one became an alert
    tokio::time::sleep(Duration::from_millis(100)).await;
    let records = pipeline.store.records().await;
    assert_eq!(records.len(), 1);

    let record = &records[0];
    assert_eq!(record.camera, "Camera 0");
    assert_eq!(record.location, "Motion Detection");
    assert_eq!(record.message, "Motion detected with score 777");
    assert_eq!(record.severity, Severity::Medium);
    let evidence = record.evidence_path.as_ref().expect("evidence expected");
    assert!(evidence.exists());

    assert!(pipeline.sink.count().await >= 1);
    assert_eq!(pipeline.audit.count().await, 1);

    pipeline.handle.stop().await;
}

#[tokio::test]
async fn disabled_detection_type_is_dropped_silently() {
    let pipeline = launch(vec![camera(0, &[DetectionKind::Motion])], false);
    let queues: Arc<TypeQueues> = pipeline.handle.queues();

    queues.for_kind(DetectionKind::Face).push(face_event(0)).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(pipeline.store.count().await, 0);
    assert_eq!(pipeline.sink.count().await, 0);
    pipeline.handle.stop().await;
}

#[tokio::test]
async fn object_burst_coalesces_to_single_alert() {
    let pipeline = launch(vec![camera(0, &[DetectionKind::Object])], false);
    let queues = pipeline.handle.queues();
    let object = queues.for_kind(DetectionKind::Object).clone();

    for _ in 0..5 {
        object.push(object_event(0)).await;
    }

    let store = pipeline.store.clone();
    wait_for(|| {
        let store = store.clone();
        async move { store.count().await >= 1 }
    })
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(pipeline.store.count().await, 1);
    assert_eq!(object.len().await, 0);
    pipeline.handle.stop().await;
}

#[tokio::test]
async fn repeated_motion_within_cooldown_is_suppressed() {
    let pipeline = launch(vec![camera(0, &[DetectionKind::Motion])], false);
    let queues = pipeline.handle.queues();
    let motion = queues.for_kind(DetectionKind::Motion).clone();

    motion.push(motion_event(0)).await;
    let store = pipeline.store.clone();
    wait_for(|| {
        let store = store.clone();
        async move { store.count().await >= 1 }
    })
    .await;

    motion.push(motion_event(0)).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(pipeline.store.count().await, 1);

    pipeline.handle.stop().await;
}

#[tokio::test]
async fn shutdown_stops_every_worker() {
    let pipeline = launch(
        vec![
            camera(0, &[DetectionKind::Motion, DetectionKind::Face]),
            camera(1, &[DetectionKind::Object]),
        ],
        false,
    );
    let expected = pipeline.handle.worker_count();
    let stats = pipeline.handle.stats();

    // 2 capture + 3 detector + 1 coordinator
    assert_eq!(expected, 6);
    pipeline.handle.stop().await;
    assert_eq!(stats.snapshot().worker_exits as usize, expected);
}
