//! Object detection stage
//!
//! Delegates inference to an external `ObjectModel` and filters the raw
//! detections by the camera's configured confidence threshold. One event is
//! emitted per processed frame, carrying every box above threshold and
//! keyed by the top-confidence label.

use super::{Detection, DetectionDetails, DetectionKind, Detector, ObjectDetection, Severity};
use crate::error::Result;
use crate::frame_buffer::Frame;

/// External object-detection model boundary
pub trait ObjectModel: Send {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<ObjectDetection>>;

    /// Model name for logging
    fn name(&self) -> &str;
}

pub struct ObjectDetector {
    model: Box<dyn ObjectModel>,
    confidence_threshold: f32,
}

impl ObjectDetector {
    pub fn new(model: Box<dyn ObjectModel>, confidence_threshold: f32) -> Self {
        Self {
            model,
            confidence_threshold,
        }
    }
}

impl Detector for ObjectDetector {
    fn kind(&self) -> DetectionKind {
        DetectionKind::Object
    }

    fn evaluate(&mut self, frame: &Frame) -> Result<Option<Detection>> {
        let raw = self.model.infer(frame)?;
        let detections: Vec<ObjectDetection> = raw
            .into_iter()
            .filter(|d| d.confidence >= self.confidence_threshold)
            .collect();

        if detections.is_empty() {
            return Ok(None);
        }

        let top_label = detections
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            .map(|d| d.label.clone())
            .unwrap_or_default();

        Ok(Some(Detection {
            severity: Severity::High,
            message: format!("Object detected: {top_label}"),
            evidence_label: Some(top_label.clone()),
            details: DetectionDetails::Objects {
                detections,
                top_label,
            },
        }))
    }
}

/// Placeholder model used when no real network is wired in.
/// Reports nothing, so the stage stays inert.
pub struct StubObjectModel;

impl ObjectModel for StubObjectModel {
    fn infer(&mut self, _frame: &Frame) -> Result<Vec<ObjectDetection>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "stub"
    }
}
