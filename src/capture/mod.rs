//! Frame capture from camera sources
//!
//! ## Responsibilities
//!
//! - Capture backend/device seam over concrete source types
//! - HTTP snapshot capture (decode + resize to the fixed frame shape)
//! - Deterministic synthetic source for wiring and tests
//! - The per-camera frame source worker overwriting its buffer slot

use crate::config_store::CameraConfig;
use crate::error::{Error, Result};
use crate::frame_buffer::{Frame, FrameBuffer, FrameShape};
use crate::stats::PipelineStats;
use crate::supervisor::ShutdownFlag;
use async_trait::async_trait;
use image::imageops::FilterType;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Prefix selecting the synthetic backend in a camera source string
pub const SYNTHETIC_SCHEME: &str = "synthetic:";

/// An opened capture device producing frames of a fixed shape
#[async_trait]
pub trait CaptureDevice: Send {
    async fn read_frame(&mut self) -> Result<Frame>;
}

/// Opens capture devices from configured source identifiers
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    async fn open(&self, source: &str, shape: FrameShape) -> Result<Box<dyn CaptureDevice>>;
}

/// HTTP snapshot capture: GET the source URL, decode the JPEG/PNG body and
/// resize it to the slot shape
pub struct HttpSnapshotBackend {
    client: reqwest::Client,
}

impl HttpSnapshotBackend {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Startup(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CaptureBackend for HttpSnapshotBackend {
    async fn open(&self, source: &str, shape: FrameShape) -> Result<Box<dyn CaptureDevice>> {
        if !source.starts_with("http://") && !source.starts_with("https://") {
            return Err(Error::Device(format!(
                "unsupported capture source '{source}' (expected http(s) snapshot URL)"
            )));
        }
        if shape.channels != 3 {
            return Err(Error::Device(format!(
                "HTTP snapshot capture produces 3-channel frames, slot wants {shape}"
            )));
        }
        Ok(Box::new(HttpSnapshotDevice {
            client: self.client.clone(),
            url: source.to_string(),
            shape,
        }))
    }
}

struct HttpSnapshotDevice {
    client: reqwest::Client,
    url: String,
    shape: FrameShape,
}

#[async_trait]
impl CaptureDevice for HttpSnapshotDevice {
    async fn read_frame(&mut self) -> Result<Frame> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::Device(format!("snapshot request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::Device(format!(
                "snapshot request returned {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Device(format!("snapshot body read failed: {e}")))?;

        let decoded = image::load_from_memory(&bytes)?.to_rgb8();
        let resized = if decoded.width() != self.shape.width
            || decoded.height() != self.shape.height
        {
            image::imageops::resize(
                &decoded,
                self.shape.width,
                self.shape.height,
                FilterType::Triangle,
            )
        } else {
            decoded
        };

        Ok(Frame::new(self.shape, resized.into_raw()))
    }
}

/// Deterministic test-pattern source. Produces frames whose fill value
/// sweeps upward, so motion stages see constant change.
pub struct SyntheticBackend;

#[async_trait]
impl CaptureBackend for SyntheticBackend {
    async fn open(&self, source: &str, shape: FrameShape) -> Result<Box<dyn CaptureDevice>> {
        if !source.starts_with(SYNTHETIC_SCHEME) {
            return Err(Error::Device(format!(
                "unsupported capture source '{source}' (expected '{SYNTHETIC_SCHEME}...')"
            )));
        }
        Ok(Box::new(SyntheticDevice { shape, tick: 0 }))
    }
}

struct SyntheticDevice {
    shape: FrameShape,
    tick: u8,
}

#[async_trait]
impl CaptureDevice for SyntheticDevice {
    async fn read_frame(&mut self) -> Result<Frame> {
        self.tick = self.tick.wrapping_add(16);
        Ok(Frame::filled(self.shape, self.tick))
    }
}

/// One worker per camera: continuously captures from the device and
/// overwrites the camera's frame slot. A failed open is logged and ends
/// the worker; there is no retry here.
pub struct CameraFrameSource {
    camera: CameraConfig,
    buffer: Arc<FrameBuffer>,
    backend: Arc<dyn CaptureBackend>,
    interval: Duration,
    shutdown: ShutdownFlag,
    stats: Arc<PipelineStats>,
}

impl CameraFrameSource {
    pub fn new(
        camera: CameraConfig,
        buffer: Arc<FrameBuffer>,
        backend: Arc<dyn CaptureBackend>,
        interval: Duration,
        shutdown: ShutdownFlag,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            camera,
            buffer,
            backend,
            interval,
            shutdown,
            stats,
        }
    }

    pub async fn run(self) {
        let mut device = match self
            .backend
            .open(&self.camera.source, self.buffer.shape())
            .await
        {
            Ok(device) => device,
            Err(e) => {
                tracing::error!(
                    camera_id = self.camera.id,
                    source = %self.camera.source,
                    error = %e,
                    "Failed to open capture source, frame source exiting"
                );
                self.stats.record_worker_exit();
                return;
            }
        };

        tracing::info!(
            camera_id = self.camera.id,
            source = %self.camera.source,
            slot = self.buffer.name(),
            "Frame source started"
        );

        loop {
            if self.shutdown.is_raised() {
                break;
            }
            match device.read_frame().await {
                Ok(frame) => {
                    if let Err(e) = self.buffer.store(frame).await {
                        tracing::warn!(
                            camera_id = self.camera.id,
                            error = %e,
                            "Captured frame rejected by slot"
                        );
                    } else {
                        self.stats.record_frame_captured();
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        camera_id = self.camera.id,
                        error = %e,
                        "Frame read failed"
                    );
                }
            }
            sleep(self.interval).await;
        }

        self.stats.record_worker_exit();
        tracing::info!(camera_id = self.camera.id, "Frame source stopped");
    }
}
