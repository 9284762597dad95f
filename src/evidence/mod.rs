//! Evidence storage - JPEG capture artifacts for human review
//!
//! ## Responsibilities
//!
//! - Encode raw frames to JPEG and write them under type-specific
//!   directories
//! - File names encode camera id, detection label (where applicable) and a
//!   timestamp
//! - Draw bounding boxes on annotated captures

use crate::detector::{BoundingBox, DetectionKind};
use crate::error::{Error, Result};
use crate::frame_buffer::Frame;
use chrono::Utc;
use image::{ImageFormat, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tokio::fs;

const BOX_COLOR: [u8; 3] = [0, 255, 0];

/// Writes evidence JPEGs under a base directory
pub struct EvidenceStore {
    base_dir: PathBuf,
}

impl EvidenceStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Storage directory for one detection kind
    pub fn dir_name(kind: DetectionKind) -> &'static str {
        match kind {
            DetectionKind::Motion => "motion_alerts",
            DetectionKind::Object => "objects_detected",
            DetectionKind::Face => "face_alerts",
        }
    }

    /// Encode the frame and write it to durable storage, returning the
    /// file path. Boxes, when given, are drawn onto a copy before
    /// encoding.
    pub async fn save(
        &self,
        kind: DetectionKind,
        camera_id: usize,
        label: Option<&str>,
        frame: &Frame,
        boxes: &[BoundingBox],
    ) -> Result<PathBuf> {
        let dir = self.base_dir.join(Self::dir_name(kind));
        fs::create_dir_all(&dir).await?;

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let label_part = label
            .map(|l| format!("_{}", sanitize_label(l)))
            .unwrap_or_default();
        let path = dir.join(format!("{kind}_cam{camera_id}{label_part}_{timestamp}.jpg"));

        let jpeg = encode_jpeg(frame, boxes)?;
        fs::write(&path, &jpeg).await?;

        tracing::debug!(
            kind = %kind,
            camera_id = camera_id,
            path = %path.display(),
            bytes = jpeg.len(),
            "Evidence frame saved"
        );
        Ok(path)
    }
}

fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn encode_jpeg(frame: &Frame, boxes: &[BoundingBox]) -> Result<Vec<u8>> {
    if frame.shape.channels != 3 {
        return Err(Error::Validation(format!(
            "evidence encoding requires 3-channel frames, got {}",
            frame.shape
        )));
    }

    let mut data = frame.data.clone();
    for bbox in boxes {
        draw_box(&mut data, frame.shape.width, frame.shape.height, bbox);
    }

    let image = RgbImage::from_raw(frame.shape.width, frame.shape.height, data)
        .ok_or_else(|| {
            Error::Validation(format!(
                "frame bytes do not match declared shape {}",
                frame.shape
            ))
        })?;

    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Jpeg)?;
    Ok(buffer.into_inner())
}

/// Rectangle outline, coordinates clamped to the frame
fn draw_box(data: &mut [u8], width: u32, height: u32, bbox: &BoundingBox) {
    if width == 0 || height == 0 {
        return;
    }
    let x1 = bbox.x1.min(width - 1);
    let x2 = bbox.x2.min(width - 1);
    let y1 = bbox.y1.min(height - 1);
    let y2 = bbox.y2.min(height - 1);
    if x1 > x2 || y1 > y2 {
        return;
    }

    let mut paint = |x: u32, y: u32| {
        let offset = (y as usize * width as usize + x as usize) * 3;
        data[offset..offset + 3].copy_from_slice(&BOX_COLOR);
    };

    for x in x1..=x2 {
        paint(x, y1);
        paint(x, y2);
    }
    for y in y1..=y2 {
        paint(x1, y);
        paint(x2, y);
    }
}
