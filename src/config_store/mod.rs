//! Configuration
//!
//! ## Responsibilities
//!
//! - Load the camera list published by the external configuration store
//!   (a JSON document) and cache it for the run
//! - Runtime tunables from environment variables with defaults
//!
//! Camera configuration is immutable for the lifetime of a pipeline run;
//! editing it is the dashboard's job, picked up on the next launch.

use crate::detector::DetectionKind;
use crate::error::{Error, Result};
use crate::frame_buffer::FrameShape;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

fn default_object_threshold() -> f32 {
    0.5
}

fn default_motion_threshold() -> u32 {
    30
}

/// One camera as published by the configuration store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Position in the configuration list; assigned on load
    #[serde(default)]
    pub id: usize,

    /// Capture source identifier (snapshot URL or synthetic pattern)
    pub source: String,

    /// Detection stages enabled for this camera
    pub detections: BTreeSet<DetectionKind>,

    /// Minimum confidence for object detections
    #[serde(rename = "objectThreshold", default = "default_object_threshold")]
    pub object_threshold: f32,

    /// Foreground pixel count that counts as motion
    #[serde(rename = "motionThreshold", default = "default_motion_threshold")]
    pub motion_threshold: u32,
}

/// Cached camera configuration for one pipeline run
pub struct ConfigStore {
    cameras: Arc<Vec<CameraConfig>>,
}

impl ConfigStore {
    /// Load the camera list from a JSON file
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Config(format!("cannot read camera list {}: {e}", path.display()))
        })?;
        let cameras: Vec<CameraConfig> = serde_json::from_str(&raw)?;
        tracing::info!(
            path = %path.display(),
            cameras = cameras.len(),
            "Camera configuration loaded"
        );
        Self::from_cameras(cameras)
    }

    /// Build a store from an in-memory list, assigning ids by position
    pub fn from_cameras(mut cameras: Vec<CameraConfig>) -> Result<Self> {
        for (index, camera) in cameras.iter_mut().enumerate() {
            camera.id = index;
            if !(0.0..=1.0).contains(&camera.object_threshold) {
                return Err(Error::Config(format!(
                    "camera {index}: object threshold {} outside [0, 1]",
                    camera.object_threshold
                )));
            }
            if camera.source.is_empty() {
                return Err(Error::Config(format!("camera {index}: empty source")));
            }
        }
        Ok(Self {
            cameras: Arc::new(cameras),
        })
    }

    pub fn cameras(&self) -> Arc<Vec<CameraConfig>> {
        self.cameras.clone()
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }
}

/// Pipeline tunables
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Fixed shape of every frame slot
    pub frame_shape: FrameShape,
    /// Delay between device reads per camera
    pub capture_interval: Duration,
    /// Idle delay between detector polls
    pub detector_poll_interval: Duration,
    /// Coordinator sleep when all queues are empty
    pub coordinator_idle: Duration,
    /// Minimum spacing between accepted alerts for one (kind, camera)
    pub alert_cooldown: Duration,
    /// Capacity of each kind queue
    pub queue_capacity: usize,
    /// How long teardown waits for workers before aborting them
    pub shutdown_grace: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            frame_shape: FrameShape::default(),
            capture_interval: Duration::from_millis(100),
            detector_poll_interval: Duration::from_millis(50),
            coordinator_idle: Duration::from_millis(50),
            alert_cooldown: Duration::from_secs(10),
            queue_capacity: 256,
            shutdown_grace: Duration::from_secs(3),
        }
    }
}

impl PipelineSettings {
    /// Build settings from environment variables, falling back to
    /// defaults for anything unset or unparsable
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            frame_shape: FrameShape::new(
                env_parse("FRAME_HEIGHT", defaults.frame_shape.height),
                env_parse("FRAME_WIDTH", defaults.frame_shape.width),
                defaults.frame_shape.channels,
            ),
            capture_interval: Duration::from_millis(env_parse(
                "CAPTURE_INTERVAL_MS",
                defaults.capture_interval.as_millis() as u64,
            )),
            detector_poll_interval: Duration::from_millis(env_parse(
                "DETECTOR_POLL_MS",
                defaults.detector_poll_interval.as_millis() as u64,
            )),
            coordinator_idle: Duration::from_millis(env_parse(
                "COORDINATOR_IDLE_MS",
                defaults.coordinator_idle.as_millis() as u64,
            )),
            alert_cooldown: Duration::from_secs(env_parse(
                "ALERT_COOLDOWN_SECS",
                defaults.alert_cooldown.as_secs(),
            )),
            queue_capacity: env_parse("EVENT_QUEUE_CAPACITY", defaults.queue_capacity),
            shutdown_grace: Duration::from_secs(env_parse(
                "SHUTDOWN_GRACE_SECS",
                defaults.shutdown_grace.as_secs(),
            )),
        }
    }
}

/// Application configuration assembled at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub cameras_file: PathBuf,
    pub evidence_dir: PathBuf,
    pub alerts_file: PathBuf,
    pub audit_log_file: PathBuf,
    pub face_gallery_file: Option<PathBuf>,
    pub mail_gateway_url: Option<String>,
    pub desktop_notify: bool,
    pub pipeline: PipelineSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cameras_file: env_path("CAMERAS_FILE", "cameras.json"),
            evidence_dir: env_path("EVIDENCE_DIR", "evidence"),
            alerts_file: env_path("ALERTS_FILE", "alerts.jsonl"),
            audit_log_file: env_path("AUDIT_LOG_FILE", "alerts_log.txt"),
            face_gallery_file: std::env::var("FACE_GALLERY_FILE").ok().map(PathBuf::from),
            mail_gateway_url: std::env::var("MAIL_GATEWAY_URL").ok(),
            desktop_notify: std::env::var("DESKTOP_NOTIFY")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            pipeline: PipelineSettings::from_env(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}
