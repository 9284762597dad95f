//! camwatch - Multi-Camera Detection and Alert Pipeline
//!
//! Main entry point: wires configuration, stores, notifiers and the
//! supervisor, then runs until interrupted.

use camwatch::{
    alert_store::JsonlAlertStore,
    audit_log::AuditLog,
    capture::{CaptureBackend, HttpSnapshotBackend, SyntheticBackend, SYNTHETIC_SCHEME},
    config_store::{AppConfig, ConfigStore},
    detector::FaceGallery,
    evidence::EvidenceStore,
    notifier::{DesktopNotifier, MailGatewayNotifier, NotificationSink},
    stats::PipelineStats,
    supervisor::{DefaultDetectorFactory, DetectorFactory, ProcessSupervisor},
};
use camwatch::error::Result as CamResult;
use camwatch::frame_buffer::FrameShape;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Audit ring capacity kept in memory
const AUDIT_RING_CAPACITY: usize = 2000;

/// Routes each camera to the backend matching its source scheme
struct SchemeBackend {
    http: HttpSnapshotBackend,
    synthetic: SyntheticBackend,
}

#[async_trait::async_trait]
impl CaptureBackend for SchemeBackend {
    async fn open(
        &self,
        source: &str,
        shape: FrameShape,
    ) -> CamResult<Box<dyn camwatch::capture::CaptureDevice>> {
        if source.starts_with(SYNTHETIC_SCHEME) {
            self.synthetic.open(source, shape).await
        } else {
            self.http.open(source, shape).await
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "camwatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting camwatch v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::default();
    tracing::info!(
        cameras_file = %config.cameras_file.display(),
        evidence_dir = %config.evidence_dir.display(),
        alerts_file = %config.alerts_file.display(),
        audit_log_file = %config.audit_log_file.display(),
        frame_shape = %config.pipeline.frame_shape,
        cooldown_secs = config.pipeline.alert_cooldown.as_secs(),
        "Configuration loaded"
    );

    let config_store = ConfigStore::load(&config.cameras_file).await?;
    if config_store.is_empty() {
        tracing::warn!("Camera list is empty, nothing to watch");
    }

    // Face gallery (optional)
    let gallery = match &config.face_gallery_file {
        Some(path) => Arc::new(FaceGallery::load(path).await?),
        None => {
            tracing::info!("No face gallery configured, faces will match as unknown");
            Arc::new(FaceGallery::empty())
        }
    };

    // Persistence and side-effect collaborators
    let store = Arc::new(JsonlAlertStore::open(&config.alerts_file).await?);
    let evidence = Arc::new(EvidenceStore::new(config.evidence_dir.clone()));
    let audit = Arc::new(AuditLog::new(
        AUDIT_RING_CAPACITY,
        Some(config.audit_log_file.clone()),
    ));

    let mut sinks: Vec<Arc<dyn NotificationSink>> = Vec::new();
    if let Some(url) = &config.mail_gateway_url {
        sinks.push(Arc::new(MailGatewayNotifier::new(url.clone())?));
        tracing::info!(gateway = %url, "Mail notifications enabled");
    }
    if config.desktop_notify {
        sinks.push(Arc::new(DesktopNotifier::default()));
        tracing::info!("Desktop notifications enabled");
    }
    if sinks.is_empty() {
        tracing::info!("No notification sinks configured");
    }

    let backend = Arc::new(SchemeBackend {
        http: HttpSnapshotBackend::new()?,
        synthetic: SyntheticBackend,
    });
    let factory: Arc<dyn DetectorFactory> = Arc::new(DefaultDetectorFactory::new(gallery));
    let stats = Arc::new(PipelineStats::new());

    let supervisor = ProcessSupervisor::new(
        config.pipeline.clone(),
        config_store.cameras(),
        backend,
        factory,
        store,
        sinks,
        evidence,
        audit,
        stats,
    );

    let handle = supervisor.launch()?;

    // Ctrl-C triggers cooperative shutdown
    let shutdown = handle.shutdown_flag();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Shutdown signal received");
        shutdown.raise();
    });

    handle.wait().await;
    tracing::info!("camwatch stopped");

    Ok(())
}
