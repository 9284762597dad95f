//! FrameBuffer - Latest-Frame Slot per Camera
//!
//! ## Responsibilities
//!
//! - Hold the most recently captured frame for one camera
//! - Single writer (the camera's frame source), any number of readers
//! - Copy-on-read: a reader always receives a complete frame, never a
//!   partial overwrite
//!
//! There is no frame queueing and no backpressure. A slow reader simply
//! misses frames.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Fixed frame geometry shared by a buffer's writer and readers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameShape {
    pub height: u32,
    pub width: u32,
    pub channels: u32,
}

impl FrameShape {
    pub const fn new(height: u32, width: u32, channels: u32) -> Self {
        Self {
            height,
            width,
            channels,
        }
    }

    /// Number of bytes a frame of this shape occupies
    pub fn byte_len(&self) -> usize {
        self.height as usize * self.width as usize * self.channels as usize
    }

    pub fn pixel_count(&self) -> usize {
        self.height as usize * self.width as usize
    }
}

impl Default for FrameShape {
    fn default() -> Self {
        Self::new(240, 320, 3)
    }
}

impl std::fmt::Display for FrameShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.height, self.width, self.channels)
    }
}

/// One captured image, 8-bit interleaved
#[derive(Debug, Clone)]
pub struct Frame {
    pub shape: FrameShape,
    pub data: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(shape: FrameShape, data: Vec<u8>) -> Self {
        Self {
            shape,
            data,
            captured_at: Utc::now(),
        }
    }

    /// Frame filled with a single byte value
    pub fn filled(shape: FrameShape, value: u8) -> Self {
        Self::new(shape, vec![value; shape.byte_len()])
    }

    pub fn matches_shape(&self, shape: FrameShape) -> bool {
        self.shape == shape && self.data.len() == shape.byte_len()
    }
}

/// Single-slot latest-wins frame buffer for one camera
pub struct FrameBuffer {
    name: String,
    shape: FrameShape,
    slot: RwLock<Option<Frame>>,
}

impl FrameBuffer {
    /// Create a buffer for the camera at the given configuration position.
    /// The slot name is derived from the position so every run maps the
    /// same camera index to the same transport name.
    pub fn new(camera_index: usize, shape: FrameShape) -> Self {
        Self {
            name: format!("frame-slot-{camera_index}"),
            shape,
            slot: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> FrameShape {
        self.shape
    }

    /// Overwrite the slot with a new frame. Only the owning frame source
    /// calls this. Frames of the wrong shape are rejected.
    pub async fn store(&self, frame: Frame) -> Result<()> {
        if !frame.matches_shape(self.shape) {
            return Err(Error::Validation(format!(
                "{}: frame shape {} ({} bytes) does not match slot shape {}",
                self.name,
                frame.shape,
                frame.data.len(),
                self.shape
            )));
        }
        let mut slot = self.slot.write().await;
        *slot = Some(frame);
        Ok(())
    }

    /// Copy the current frame out of the slot. Returns `None` until the
    /// writer has stored its first frame. The copy is always a complete
    /// frame some writer stored, never a partial overwrite.
    pub async fn snapshot(&self) -> Option<Frame> {
        let slot = self.slot.read().await;
        slot.clone()
    }

    pub async fn is_empty(&self) -> bool {
        self.slot.read().await.is_none()
    }
}
